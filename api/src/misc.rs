use derive_more::Display;
use thiserror::Error;

use crate::cbindings::{
    JNI_EDETACHED, JNI_EEXIST, JNI_EINVAL, JNI_ENOMEM, JNI_ERR, JNI_EVERSION, JNI_OK,
    JNI_VERSION_1_1, JNI_VERSION_1_2, jint,
};

/// Interface version requested when creating the runtime.
pub const REQUESTED_VERSION: jint = JNI_VERSION_1_2;

/// Interface version whose legacy argument block reports the default stack size.
pub const LEGACY_VERSION: jint = JNI_VERSION_1_1;

/// Non-success status codes of the invocation interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum JniStatus {
    #[display("unknown error")]
    Unknown,
    #[display("thread detached from the VM")]
    Detached,
    #[display("JNI version error")]
    Version,
    #[display("not enough memory")]
    NoMemory,
    #[display("VM already created")]
    AlreadyExists,
    #[display("invalid arguments")]
    InvalidArguments,
    #[display("unrecognized status {_0}")]
    Other(jint),
}

impl JniStatus {
    /// Maps a raw return code onto `Ok(())` or the matching status.
    pub const fn check(code: jint) -> Result<(), Self> {
        match code {
            JNI_OK => Ok(()),
            JNI_ERR => Err(Self::Unknown),
            JNI_EDETACHED => Err(Self::Detached),
            JNI_EVERSION => Err(Self::Version),
            JNI_ENOMEM => Err(Self::NoMemory),
            JNI_EEXIST => Err(Self::AlreadyExists),
            JNI_EINVAL => Err(Self::InvalidArguments),
            other => Err(Self::Other(other)),
        }
    }
}
