//! Full-transfer helpers built only on the capability traits.

mod read_ext;
mod write_ext;

pub use read_ext::{AsyncReadExt, SyncReadExt};
pub use write_ext::{AsyncWriteExt, SyncWriteExt};

use crate::error::{Error, ErrorKind};

fn premature_eof(transferred: usize, wanted: usize) -> Error {
    Error::new(ErrorKind::PrematureEof)
        .with_message(format!("transferred {transferred} of {wanted} bytes"))
}
