//! Hand-maintained mirror of the parts of `jni.h` the launcher touches.
//!
//! Only the invocation interface is laid out in full. The native interface
//! table keeps its real slot positions, but functions the launcher never calls
//! are collapsed into opaque padding.

use core::ffi::{c_char, c_void};

pub type jint = i32;
pub type jlong = i64;
pub type jboolean = u8;
pub type jsize = jint;

pub type jobject = *mut c_void;
pub type jclass = jobject;
pub type jstring = jobject;
pub type jthrowable = jobject;
pub type jarray = jobject;
pub type jobjectArray = jarray;
pub type jmethodID = *mut c_void;
pub type jfieldID = *mut c_void;

pub const JNI_FALSE: jboolean = 0;
pub const JNI_TRUE: jboolean = 1;

pub const JNI_OK: jint = 0;
pub const JNI_ERR: jint = -1;
pub const JNI_EDETACHED: jint = -2;
pub const JNI_EVERSION: jint = -3;
pub const JNI_ENOMEM: jint = -4;
pub const JNI_EEXIST: jint = -5;
pub const JNI_EINVAL: jint = -6;

pub const JNI_VERSION_1_1: jint = 0x0001_0001;
pub const JNI_VERSION_1_2: jint = 0x0001_0002;

#[repr(C)]
#[derive(Clone, Copy)]
pub union jvalue {
    pub z: jboolean,
    pub b: i8,
    pub c: u16,
    pub s: i16,
    pub i: jint,
    pub j: jlong,
    pub f: f32,
    pub d: f64,
    pub l: jobject,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CJavaVMOption {
    pub optionString: *mut c_char,
    pub extraInfo: *mut c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CJavaVMInitArgs {
    pub version: jint,
    pub nOptions: jint,
    pub options: *mut CJavaVMOption,
    pub ignoreUnrecognized: jboolean,
}

/// Legacy argument block. Still the only way to learn the runtime's default
/// thread stack size through `JNI_GetDefaultJavaVMInitArgs`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CJDK1_1InitArgs {
    pub version: jint,
    pub properties: *mut *mut c_char,
    pub checkSource: jint,
    pub nativeStackSize: jint,
    pub javaStackSize: jint,
    pub minHeapSize: jint,
    pub maxHeapSize: jint,
    pub verifyMode: jint,
    pub classpath: *mut c_char,
    pub vfprintf: *mut c_void,
    pub exit: *mut c_void,
    pub abort: *mut c_void,
    pub enableClassGC: jint,
    pub enableVerboseGC: jint,
    pub disableAsyncGC: jint,
    pub verbose: jint,
    pub debugging: jboolean,
    pub debugPort: jint,
}

impl CJDK1_1InitArgs {
    #[must_use]
    pub const fn request(version: jint) -> Self {
        Self {
            version,
            properties: core::ptr::null_mut(),
            checkSource: 0,
            nativeStackSize: 0,
            javaStackSize: 0,
            minHeapSize: 0,
            maxHeapSize: 0,
            verifyMode: 0,
            classpath: core::ptr::null_mut(),
            vfprintf: core::ptr::null_mut(),
            exit: core::ptr::null_mut(),
            abort: core::ptr::null_mut(),
            enableClassGC: 0,
            enableVerboseGC: 0,
            disableAsyncGC: 0,
            verbose: 0,
            debugging: JNI_FALSE,
            debugPort: 0,
        }
    }
}

pub type JavaVM = *const CJNIInvokeInterface;
pub type JNIEnv = *const CJNINativeInterface;

#[repr(C)]
pub struct CJNIInvokeInterface {
    pub reserved0: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: *mut c_void,
    pub DestroyJavaVM: Option<unsafe extern "system" fn(vm: *mut JavaVM) -> jint>,
    pub AttachCurrentThread: Option<
        unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, args: *mut c_void) -> jint,
    >,
    pub DetachCurrentThread: Option<unsafe extern "system" fn(vm: *mut JavaVM) -> jint>,
    pub GetEnv:
        Option<unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, version: jint) -> jint>,
    pub AttachCurrentThreadAsDaemon: Option<
        unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, args: *mut c_void) -> jint,
    >,
}

#[repr(C)]
pub struct CJNINativeInterface {
    pub reserved0: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: *mut c_void,
    pub reserved3: *mut c_void,
    pub GetVersion: Option<unsafe extern "system" fn(env: *mut JNIEnv) -> jint>,
    pub DefineClass: *mut c_void,
    pub FindClass: Option<unsafe extern "system" fn(env: *mut JNIEnv, name: *const c_char) -> jclass>,
    _pad_7_14: [*mut c_void; 8],
    pub ExceptionOccurred: Option<unsafe extern "system" fn(env: *mut JNIEnv) -> jthrowable>,
    pub ExceptionDescribe: Option<unsafe extern "system" fn(env: *mut JNIEnv)>,
    pub ExceptionClear: Option<unsafe extern "system" fn(env: *mut JNIEnv)>,
    _pad_18_22: [*mut c_void; 5],
    pub DeleteLocalRef: Option<unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject)>,
    _pad_24_112: [*mut c_void; 89],
    pub GetStaticMethodID: Option<
        unsafe extern "system" fn(
            env: *mut JNIEnv,
            clazz: jclass,
            name: *const c_char,
            sig: *const c_char,
        ) -> jmethodID,
    >,
    _pad_114_142: [*mut c_void; 29],
    pub CallStaticVoidMethodA: Option<
        unsafe extern "system" fn(env: *mut JNIEnv, clazz: jclass, method: jmethodID, args: *const jvalue),
    >,
    pub GetStaticFieldID: Option<
        unsafe extern "system" fn(
            env: *mut JNIEnv,
            clazz: jclass,
            name: *const c_char,
            sig: *const c_char,
        ) -> jfieldID,
    >,
    pub GetStaticObjectField:
        Option<unsafe extern "system" fn(env: *mut JNIEnv, clazz: jclass, field: jfieldID) -> jobject>,
    _pad_146_166: [*mut c_void; 21],
    pub NewStringUTF: Option<unsafe extern "system" fn(env: *mut JNIEnv, utf: *const c_char) -> jstring>,
    _pad_168: *mut c_void,
    pub GetStringUTFChars: Option<
        unsafe extern "system" fn(env: *mut JNIEnv, string: jstring, is_copy: *mut jboolean) -> *const c_char,
    >,
    pub ReleaseStringUTFChars:
        Option<unsafe extern "system" fn(env: *mut JNIEnv, string: jstring, utf: *const c_char)>,
    _pad_171: *mut c_void,
    pub NewObjectArray: Option<
        unsafe extern "system" fn(
            env: *mut JNIEnv,
            len: jsize,
            clazz: jclass,
            init: jobject,
        ) -> jobjectArray,
    >,
    _pad_173: *mut c_void,
    pub SetObjectArrayElement:
        Option<unsafe extern "system" fn(env: *mut JNIEnv, array: jobjectArray, index: jsize, value: jobject)>,
}

/// `JNI_CreateJavaVM` as exported by the runtime library.
pub type CreateJavaVmFn =
    unsafe extern "system" fn(pvm: *mut *mut JavaVM, penv: *mut *mut c_void, args: *mut c_void) -> jint;

/// `JNI_GetDefaultJavaVMInitArgs` as exported by the runtime library.
pub type GetDefaultJavaVmInitArgsFn = unsafe extern "system" fn(args: *mut c_void) -> jint;
