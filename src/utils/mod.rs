pub(crate) mod bincode;
pub(crate) mod io;
pub(crate) mod string;
