/// Validation messenger - routes layer messages into the engine log
///
/// Compiled only with the `vulkan-validation` feature. Messages below the
/// configured severity are dropped; the rest are counted, grouped by message
/// ID, and logged under `cluster3d::vulkan::validation`.

use ash::vk;
use colored::*;
use cluster_3d_engine::cluster3d::{DebugSeverity, Engine};
use cluster_3d_engine::cluster3d::log::LogSeverity;
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const SOURCE: &str = "cluster3d::vulkan::validation";

/// Callback state, set while a messenger exists
static MESSENGER_CONFIG: Mutex<Option<Config>> = Mutex::new(None);

static COUNTERS: Counters = Counters::new();

/// Occurrences per message ID since the last `init_debug_config`
static REPEATS: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub severity: DebugSeverity,
    pub enable_stats: bool,
}

/// Validation message counts since the last `init_debug_config`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
    /// Message IDs seen more than once
    pub repeated_ids: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

impl fmt::Display for ValidationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total() == 0 {
            return write!(f, "no validation messages");
        }
        write!(f, "{} validation messages ({} errors, {} warnings, {} info, {} verbose)",
            self.total(), self.errors, self.warnings, self.info, self.verbose)?;
        if self.repeated_ids > 0 {
            write!(f, ", {} repeated IDs", self.repeated_ids)?;
        }
        Ok(())
    }
}

struct Counters {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl Counters {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn for_class(&self, class: MessageClass) -> &AtomicU32 {
        match class {
            MessageClass::Error => &self.errors,
            MessageClass::Warning => &self.warnings,
            MessageClass::Info => &self.info,
            MessageClass::Verbose => &self.verbose,
        }
    }

    fn reset(&self) {
        for counter in [&self.errors, &self.warnings, &self.info, &self.verbose] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Most severe bit of a message's severity flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageClass {
    Error,
    Warning,
    Info,
    Verbose,
}

impl MessageClass {
    pub(crate) fn of(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Self::Error
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Self::Warning
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Self::Info
        } else {
            Self::Verbose
        }
    }

    /// Layer INFO is driver chatter; it is logged at Debug, VERBOSE at Trace
    pub(crate) fn log_severity(self) -> LogSeverity {
        match self {
            Self::Error => LogSeverity::Error,
            Self::Warning => LogSeverity::Warn,
            Self::Info => LogSeverity::Debug,
            Self::Verbose => LogSeverity::Trace,
        }
    }
}

/// Severity flags the messenger should be created with
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let errors = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    let warnings = errors | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    match severity {
        DebugSeverity::ErrorsOnly => errors,
        DebugSeverity::ErrorsAndWarnings => warnings,
        DebugSeverity::All => {
            warnings
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

fn passes_filter(severity: DebugSeverity, message_severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
    severity_flags(severity).intersects(message_severity)
}

fn type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

/// One log line; the repeat count is shown from the second occurrence on
pub(crate) fn format_message(label: &str, id: &str, message: &str, occurrence: u32) -> String {
    if occurrence > 1 {
        format!("[{}] {} (x{}): {}", label, id, occurrence, message)
    } else {
        format!("[{}] {}: {}", label, id, message)
    }
}

/// Reset counters and start routing messages
pub fn init_debug_config(config: Config) {
    COUNTERS.reset();
    if let Ok(mut repeats) = REPEATS.lock() {
        *repeats = Some(FxHashMap::default());
    }
    if let Ok(mut slot) = MESSENGER_CONFIG.lock() {
        *slot = Some(config);
    }
}

/// Stop routing messages; called before the messenger is destroyed
pub fn cleanup_debug_config() {
    if let Ok(mut slot) = MESSENGER_CONFIG.lock() {
        *slot = None;
    }
}

pub fn get_validation_stats() -> ValidationStats {
    let repeated_ids = REPEATS
        .lock()
        .ok()
        .and_then(|repeats| repeats.as_ref().map(|r| r.values().filter(|&&n| n > 1).count() as u32))
        .unwrap_or(0);
    ValidationStats {
        errors: COUNTERS.errors.load(Ordering::Relaxed),
        warnings: COUNTERS.warnings.load(Ordering::Relaxed),
        info: COUNTERS.info.load(Ordering::Relaxed),
        verbose: COUNTERS.verbose.load(Ordering::Relaxed),
        repeated_ids,
    }
}

/// Print the statistics to stdout, red when any error was reported
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();
    let line = stats.to_string();
    if stats.errors > 0 {
        println!("{}", line.red().bold());
    } else if stats.warnings > 0 {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.green());
    }
}

fn count_occurrence(config: Config, class: MessageClass, id: &str) -> u32 {
    if !config.enable_stats {
        return 1;
    }
    COUNTERS.for_class(class).fetch_add(1, Ordering::Relaxed);
    match REPEATS.lock() {
        Ok(mut repeats) => {
            let count = repeats
                .get_or_insert_with(FxHashMap::default)
                .entry(id.to_string())
                .or_insert(0);
            *count += 1;
            *count
        }
        Err(_) => 1,
    }
}

/// # Safety
///
/// `ptr` is null or a NUL-terminated string valid for `'a`.
unsafe fn c_text<'a>(ptr: *const c_char, missing: &'a str) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed(missing)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Vulkan debug messenger callback
///
/// # Safety
///
/// Called by the validation layers with a valid callback data pointer.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let config = match MESSENGER_CONFIG.lock() {
        Ok(guard) => match *guard {
            Some(config) => config,
            None => return vk::FALSE,
        },
        Err(_) => return vk::FALSE,
    };
    if !passes_filter(config.severity, message_severity) || p_callback_data.is_null() {
        return vk::FALSE;
    }

    let data = &*p_callback_data;
    let id = c_text(data.p_message_id_name, "unknown");
    let message = c_text(data.p_message, "");

    let class = MessageClass::of(message_severity);
    let occurrence = count_occurrence(config, class, &id);
    Engine::log(
        class.log_severity(),
        SOURCE,
        format_message(type_label(message_type), &id, &message, occurrence),
    );

    // Never abort the call that triggered the message
    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
