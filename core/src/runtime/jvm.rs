//! The runtime traits implemented over the JNI invocation interface.

use std::ffi::CString;

use anyhow::Context as _;
use lijy_api::c::jvalue;
use lijy_api::{InitOptions, JavaVm, JniEnv, JniError};
use tracing::debug;

use crate::loader::RuntimeHandle;
use crate::runtime::options::JvmOption;
use crate::runtime::{EntryPoint, Outcome, RuntimeInstance, RuntimeLibrary};

const MAIN_METHOD: &std::ffi::CStr = c"main";
const MAIN_SIGNATURE: &std::ffi::CStr = c"([Ljava/lang/String;)V";
const USAGE_FIELD: &std::ffi::CStr = c"usage";
const STRING_SIGNATURE: &std::ffi::CStr = c"Ljava/lang/String;";

impl RuntimeLibrary for RuntimeHandle {
    type Instance = JvmInstance;

    fn default_stack_size(&self) -> Option<u64> {
        unsafe { lijy_api::default_stack_size(self.default_init_args) }
    }

    fn create(&self, options: &[JvmOption]) -> Result<JvmInstance, JniError> {
        let mut init = InitOptions::new(options.iter().map(|entry| (entry.option.as_str(), entry.extra_info)))?;
        debug!(count = options.len(), "creating runtime");
        let (vm, env) = unsafe { JavaVm::create(self.create_vm, &mut init) }?;
        Ok(JvmInstance { vm, env })
    }
}

/// A created runtime, owned by the thread that created it.
#[derive(Debug)]
pub struct JvmInstance {
    vm: JavaVm,
    env: JniEnv,
}

impl JvmInstance {
    /// Prints the pending exception, if any, when a setup step fails.
    fn check<T>(&self, result: Result<T, JniError>) -> Result<T, JniError> {
        if result.is_err() && self.env.exception_pending().unwrap_or(false) {
            self.env.describe_exception()?;
        }
        result
    }

    fn print_usage(&self, class: lijy_api::c::jclass, help: &str) -> anyhow::Result<()> {
        let field = self
            .check(self.env.static_field_id(class, USAGE_FIELD, STRING_SIGNATURE))
            .context("usage text not found")?;
        let usage = self
            .check(self.env.static_object_field(class, field))
            .context("could not read usage text")?;
        let text = self.check(self.env.string_value(usage))?;
        eprintln!("{text}\n");
        eprint!("{help}");
        Ok(())
    }
}

impl RuntimeInstance for JvmInstance {
    fn run_entry(&mut self, entry: &EntryPoint) -> anyhow::Result<Outcome> {
        let class_name = CString::new(entry.class.as_str())?;
        let class = self
            .check(self.env.find_class(&class_name))
            .with_context(|| format!("could not find or load main class {}", entry.class))?;

        if let Some(help) = &entry.help {
            self.print_usage(class, help)?;
        } else {
            let main = self
                .check(self.env.static_method_id(class, MAIN_METHOD, MAIN_SIGNATURE))
                .with_context(|| format!("no main method in {}", entry.class))?;
            let args = self
                .check(self.env.new_string_array(&entry.args))
                .context("could not build the argument array")?;
            self.env.call_static_void_method(class, main, &[jvalue { l: args }])?;
        }

        // A fault left pending here is reported by the runtime when the thread detaches.
        if self.env.exception_pending()? {
            return Ok(Outcome::Failure);
        }
        Ok(Outcome::Success)
    }

    fn detach(&mut self) -> Result<(), JniError> {
        self.vm.detach()
    }

    fn destroy(self) -> Result<(), JniError> {
        self.vm.destroy()
    }
}
