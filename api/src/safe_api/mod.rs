use core::ffi::{CStr, c_void};
use core::ptr;
use std::ffi::NulError;
use std::str::Utf8Error;

use derive_more::Display;
use thiserror::Error;

use crate::cbindings::{
    CJDK1_1InitArgs, CJavaVMInitArgs, CreateJavaVmFn, GetDefaultJavaVmInitArgsFn, JNI_FALSE,
    JNIEnv, JavaVM, jclass, jfieldID, jmethodID, jobject, jobjectArray, jsize, jstring, jvalue,
};
use crate::misc::{JniStatus, LEGACY_VERSION, REQUESTED_VERSION};

pub mod misc;

pub use misc::{ExtraInfo, InitOptions};

#[derive(Debug, Display, Error)]
pub enum JniError {
    Status(#[from] JniStatus),
    #[display("function table slot is empty")]
    NullFunctionPointer,
    #[display("{_0} returned null")]
    NullResult(&'static str),
    #[display("too many elements for a JNI array")]
    TooLarge,
    InteriorNul(#[from] NulError),
    Utf8(#[from] Utf8Error),
}

pub trait ErrorMapper<T> {
    fn err_null_fp(self) -> Result<T, JniError>;
    fn err_null_result(self, call: &'static str) -> Result<T, JniError>;
}

impl<T> ErrorMapper<T> for Option<T> {
    fn err_null_fp(self) -> Result<T, JniError> {
        self.ok_or(JniError::NullFunctionPointer)
    }

    fn err_null_result(self, call: &'static str) -> Result<T, JniError> {
        self.ok_or(JniError::NullResult(call))
    }
}

/// Turns a possibly-null JNI reference into an `Option`.
trait NonNullRef: Sized {
    fn non_null(self) -> Option<Self>;
}

impl NonNullRef for *mut c_void {
    fn non_null(self) -> Option<Self> {
        (!self.is_null()).then_some(self)
    }
}

/// Queries the runtime's default thread stack size in bytes.
///
/// Returns `None` when the runtime does not report one.
///
/// # Safety
/// `get_default` must be the `JNI_GetDefaultJavaVMInitArgs` export of a loaded runtime.
pub unsafe fn default_stack_size(get_default: GetDefaultJavaVmInitArgsFn) -> Option<u64> {
    let mut args = CJDK1_1InitArgs::request(LEGACY_VERSION);
    // Status ignored: runtimes that reject the legacy version still fill in the stack size.
    unsafe { get_default(ptr::from_mut(&mut args).cast()) };
    u64::try_from(args.javaStackSize).ok().filter(|size| *size > 0)
}

/// A runtime created by this process.
#[derive(Debug)]
pub struct JavaVm {
    raw: *mut JavaVM,
}

impl JavaVm {
    /// Creates the runtime and attaches the calling thread to it.
    ///
    /// # Safety
    /// `create` must be the `JNI_CreateJavaVM` export of a loaded runtime.
    pub unsafe fn create(create: CreateJavaVmFn, options: &mut InitOptions) -> Result<(Self, JniEnv), JniError> {
        let mut args = CJavaVMInitArgs {
            version: REQUESTED_VERSION,
            nOptions: options.count()?,
            options: options.as_mut_ptr(),
            ignoreUnrecognized: JNI_FALSE,
        };
        let mut vm: *mut JavaVM = ptr::null_mut();
        let mut env: *mut c_void = ptr::null_mut();
        JniStatus::check(unsafe { create(&raw mut vm, &raw mut env, ptr::from_mut(&mut args).cast()) })?;
        if vm.is_null() || env.is_null() {
            return Err(JniError::NullResult("JNI_CreateJavaVM"));
        }
        Ok((Self { raw: vm }, JniEnv { raw: env.cast() }))
    }

    pub fn detach(&self) -> Result<(), JniError> {
        let detach = unsafe { (**self.raw).DetachCurrentThread }.err_null_fp()?;
        Ok(JniStatus::check(unsafe { detach(self.raw) })?)
    }

    /// Blocks until every non-daemon thread of the runtime has finished.
    pub fn destroy(self) -> Result<(), JniError> {
        let destroy = unsafe { (**self.raw).DestroyJavaVM }.err_null_fp()?;
        Ok(JniStatus::check(unsafe { destroy(self.raw) })?)
    }
}

/// The native interface of the thread that created the runtime.
#[derive(Debug)]
pub struct JniEnv {
    raw: *mut JNIEnv,
}

macro_rules! jni_fn {
    ($env:expr, $name:ident) => {
        unsafe { (**$env.raw).$name }.err_null_fp()?
    };
}

impl JniEnv {
    pub fn find_class(&self, name: &CStr) -> Result<jclass, JniError> {
        let find_class = jni_fn!(self, FindClass);
        unsafe { find_class(self.raw, name.as_ptr()) }
            .non_null()
            .err_null_result("FindClass")
    }

    pub fn static_method_id(&self, class: jclass, name: &CStr, signature: &CStr) -> Result<jmethodID, JniError> {
        let method_id = jni_fn!(self, GetStaticMethodID);
        unsafe { method_id(self.raw, class, name.as_ptr(), signature.as_ptr()) }
            .non_null()
            .err_null_result("GetStaticMethodID")
    }

    pub fn static_field_id(&self, class: jclass, name: &CStr, signature: &CStr) -> Result<jfieldID, JniError> {
        let field_id = jni_fn!(self, GetStaticFieldID);
        unsafe { field_id(self.raw, class, name.as_ptr(), signature.as_ptr()) }
            .non_null()
            .err_null_result("GetStaticFieldID")
    }

    pub fn static_object_field(&self, class: jclass, field: jfieldID) -> Result<jobject, JniError> {
        let get_field = jni_fn!(self, GetStaticObjectField);
        unsafe { get_field(self.raw, class, field) }
            .non_null()
            .err_null_result("GetStaticObjectField")
    }

    pub fn call_static_void_method(&self, class: jclass, method: jmethodID, args: &[jvalue]) -> Result<(), JniError> {
        let call = jni_fn!(self, CallStaticVoidMethodA);
        unsafe { call(self.raw, class, method, args.as_ptr()) };
        Ok(())
    }

    pub fn new_string(&self, text: &str) -> Result<jstring, JniError> {
        let text = std::ffi::CString::new(text)?;
        let new_string = jni_fn!(self, NewStringUTF);
        unsafe { new_string(self.raw, text.as_ptr()) }
            .non_null()
            .err_null_result("NewStringUTF")
    }

    /// Builds a `java.lang.String[]` holding `items`.
    pub fn new_string_array<S: AsRef<str>>(&self, items: &[S]) -> Result<jobjectArray, JniError> {
        let length = jsize::try_from(items.len()).map_err(|_| JniError::TooLarge)?;
        let string_class = self.find_class(c"java/lang/String")?;
        let new_array = jni_fn!(self, NewObjectArray);
        let array = unsafe { new_array(self.raw, length, string_class, ptr::null_mut()) }
            .non_null()
            .err_null_result("NewObjectArray")?;
        let set_element = jni_fn!(self, SetObjectArrayElement);
        for (index, item) in (0..length).zip(items) {
            let element = self.new_string(item.as_ref())?;
            unsafe { set_element(self.raw, array, index, element) };
            self.delete_local_ref(element)?;
        }
        self.delete_local_ref(string_class)?;
        Ok(array)
    }

    /// Copies a Java string into an owned Rust string.
    pub fn string_value(&self, string: jstring) -> Result<String, JniError> {
        let get_chars = jni_fn!(self, GetStringUTFChars);
        let release_chars = jni_fn!(self, ReleaseStringUTFChars);
        let chars = unsafe { get_chars(self.raw, string, ptr::null_mut()) };
        if chars.is_null() {
            return Err(JniError::NullResult("GetStringUTFChars"));
        }
        let value = unsafe { CStr::from_ptr(chars) }.to_str().map(str::to_owned);
        unsafe { release_chars(self.raw, string, chars) };
        Ok(value?)
    }

    pub fn exception_pending(&self) -> Result<bool, JniError> {
        let occurred = jni_fn!(self, ExceptionOccurred);
        let throwable = unsafe { occurred(self.raw) };
        if throwable.is_null() {
            return Ok(false);
        }
        self.delete_local_ref(throwable)?;
        Ok(true)
    }

    /// Prints the pending exception and its trace to stderr, clearing it.
    pub fn describe_exception(&self) -> Result<(), JniError> {
        let describe = jni_fn!(self, ExceptionDescribe);
        unsafe { describe(self.raw) };
        Ok(())
    }

    pub fn delete_local_ref(&self, object: jobject) -> Result<(), JniError> {
        let delete = jni_fn!(self, DeleteLocalRef);
        unsafe { delete(self.raw, object) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_checks_name_the_call() {
        let missing: Option<u8> = None;
        let err = missing.err_null_result("FindClass").unwrap_err();
        assert_eq!(err.to_string(), "FindClass returned null");
        assert!(matches!(None::<u8>.err_null_fp(), Err(JniError::NullFunctionPointer)));
    }

    #[test]
    fn status_errors_display_their_cause() {
        let err = JniError::from(JniStatus::NoMemory);
        assert_eq!(err.to_string(), "not enough memory");
    }

    unsafe extern "system" fn reports_stack(args: *mut c_void) -> i32 {
        let args = unsafe { &mut *args.cast::<CJDK1_1InitArgs>() };
        assert_eq!(args.version, LEGACY_VERSION);
        args.javaStackSize = 1 << 20;
        -3
    }

    unsafe extern "system" fn reports_nothing(_args: *mut c_void) -> i32 {
        0
    }

    #[test]
    fn default_stack_size_reads_legacy_block() {
        assert_eq!(unsafe { default_stack_size(reports_stack) }, Some(1 << 20));
        assert_eq!(unsafe { default_stack_size(reports_nothing) }, None);
    }
}
