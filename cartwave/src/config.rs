//! Options to control how files are opened

/// Options to control how a file is opened for reading
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ParseOptions {
	pub(crate) read_metadata: bool,
	pub(crate) read_peaks: bool,
}

impl Default for ParseOptions {
	/// The default implementation for `ParseOptions`
	///
	/// The defaults are as follows:
	///
	/// ```rust,ignore
	/// ParseOptions {
	/// 	read_metadata: true,
	/// 	read_peaks: true,
	/// }
	/// ```
	fn default() -> Self {
		Self::new()
	}
}

impl ParseOptions {
	/// Creates a new `ParseOptions`, alias for `Default` implementation
	///
	/// See also: [`ParseOptions::default`]
	#[must_use]
	pub const fn new() -> Self {
		Self {
			read_metadata: true,
			read_peaks: true,
		}
	}

	/// Whether or not to read the metadata chunks (cart, bext, list, proprietary)
	///
	/// Audio properties and payload geometry are always read.
	pub fn read_metadata(&mut self, read_metadata: bool) -> Self {
		self.read_metadata = read_metadata;
		*self
	}

	/// Whether or not to load the peak table from a `levl` chunk, if one exists
	pub fn read_peaks(&mut self, read_peaks: bool) -> Self {
		self.read_peaks = read_peaks;
		*self
	}
}
