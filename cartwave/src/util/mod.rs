pub(crate) mod alloc;
pub(crate) mod text;
pub(crate) mod time;
