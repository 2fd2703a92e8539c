use crate::error::Result;

// A fallible alternative to `vec![elem; size]`, for sizes that come out of
// untrusted chunk headers
pub(crate) fn fallible_vec_from_element<T: Clone>(element: T, size: usize) -> Result<Vec<T>> {
	let mut vec = Vec::new();
	vec.try_reserve_exact(size)?;
	vec.resize(size, element);

	Ok(vec)
}
