use core::ffi::c_void;
use std::ffi::CString;

use crate::cbindings::{CJavaVMOption, jint};
use crate::safe_api::JniError;

/// Opaque word handed to the runtime next to an option string.
///
/// The launcher never sets one itself, but the slot is part of the option
/// record and is carried through unchanged.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtraInfo(usize);

impl ExtraInfo {
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    fn as_ptr(self) -> *mut c_void {
        core::ptr::without_provenance_mut(self.0)
    }
}

/// Option strings converted for `JNI_CreateJavaVM`.
///
/// Owns the NUL-terminated copies, so the raw records stay valid for as long
/// as this value lives.
#[derive(Debug)]
pub struct InitOptions {
    _strings: Vec<CString>,
    records: Vec<CJavaVMOption>,
}

impl InitOptions {
    pub fn new<'a, I>(options: I) -> Result<Self, JniError>
    where
        I: IntoIterator<Item = (&'a str, ExtraInfo)>,
    {
        let mut strings = Vec::new();
        let mut records = Vec::new();
        for (option, extra_info) in options {
            let owned = CString::new(option)?;
            records.push(CJavaVMOption {
                optionString: owned.as_ptr().cast_mut(),
                extraInfo: extra_info.as_ptr(),
            });
            strings.push(owned);
        }
        Ok(Self {
            _strings: strings,
            records,
        })
    }

    pub(crate) fn count(&self) -> Result<jint, JniError> {
        jint::try_from(self.records.len()).map_err(|_| JniError::TooLarge)
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut CJavaVMOption {
        self.records.as_mut_ptr()
    }
}
