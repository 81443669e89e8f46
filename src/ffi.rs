//! FFI bindings for Engagement Metrics
//!
//! C-compatible functions for driving the trackers from a host UI runtime.
//! Signals go in as `engage.host_signal.v1` JSON; every call that accepts
//! signals returns the events they produced as a JSON array. Returned strings
//! must be freed by the caller using `engage_free_string`.
//!
//! A processor handle is not thread-safe. Use it from the thread that
//! created it, normally the UI thread.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::rc::Rc;

use crate::config::TrackerConfig;
use crate::emitter::{MetricsEvent, RecordingEmitter};
use crate::error::TrackerError;
use crate::processor::{replay_signals, MetricsProcessor};
use crate::signal::{HostSignal, SignalParser};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Optional config argument: NULL means defaults.
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<TrackerConfig, TrackerError> {
    if config_json.is_null() {
        return Ok(TrackerConfig::default());
    }
    match cstr_to_string(config_json) {
        Some(json) => TrackerConfig::from_json(&json),
        None => Err(TrackerError::InvalidConfig(
            "config is not valid UTF-8".to_string(),
        )),
    }
}

fn events_to_json(events: &[MetricsEvent]) -> Result<String, TrackerError> {
    serde_json::to_string(events).map_err(|e| TrackerError::EncodingError(e.to_string()))
}

/// Serialize `result` for the caller, or record its error and return NULL.
fn finish(result: Result<String, TrackerError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay an NDJSON signal stream and return every emitted event.
///
/// # Safety
/// - `ndjson` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_replay(
    ndjson: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let ndjson_str = match cstr_to_string(ndjson) {
        Some(s) => s,
        None => {
            set_last_error("Invalid NDJSON string pointer");
            return ptr::null_mut();
        }
    };

    finish(
        config_from_ptr(config_json)
            .and_then(|config| replay_signals(&ndjson_str, config))
            .and_then(|events| events_to_json(&events)),
    )
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a MetricsProcessor and the emitter it records into
pub struct EngageProcessorHandle {
    processor: MetricsProcessor,
    events: Rc<RecordingEmitter>,
}

impl EngageProcessorHandle {
    fn apply_all(&mut self, signals: Vec<HostSignal>) -> Result<String, TrackerError> {
        let result = signals
            .into_iter()
            .try_for_each(|signal| self.processor.apply(signal));
        // Events emitted before a failing signal are still handed back on the
        // next successful call.
        result?;
        events_to_json(&self.events.drain())
    }
}

/// Create a new processor.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `engage_processor_free`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_new(
    config_json: *const c_char,
) -> *mut EngageProcessorHandle {
    clear_last_error();

    let config = match config_from_ptr(config_json) {
        Ok(config) => config,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let events = Rc::new(RecordingEmitter::new());
    let processor = MetricsProcessor::new(config, events.clone());
    Box::into_raw(Box::new(EngageProcessorHandle { processor, events }))
}

/// Free a processor. Live impressions are not ended; call
/// `engage_processor_shutdown` first to flush them.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engage_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_free(processor: *mut EngageProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Apply one host signal and return the events it produced.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engage_processor_new`.
/// - `signal_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_apply(
    processor: *mut EngageProcessorHandle,
    signal_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(signal_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid signal string pointer");
            return ptr::null_mut();
        }
    };

    finish(
        serde_json::from_str::<HostSignal>(&json_str)
            .map_err(TrackerError::from)
            .and_then(|signal| handle.apply_all(vec![signal])),
    )
}

/// Apply a batch of NDJSON host signals and return the events they produced.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engage_processor_new`.
/// - `ndjson` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_apply_ndjson(
    processor: *mut EngageProcessorHandle,
    ndjson: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let ndjson_str = match cstr_to_string(ndjson) {
        Some(s) => s,
        None => {
            set_last_error("Invalid NDJSON string pointer");
            return ptr::null_mut();
        }
    };

    finish(SignalParser::parse_ndjson(&ndjson_str).and_then(|signals| handle.apply_all(signals)))
}

/// Unmount every collection and return the resulting end events.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engage_processor_new`.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_processor_shutdown(
    processor: *mut EngageProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;
    handle.processor.shutdown();
    finish(events_to_json(&handle.events.drain()))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Engagement Metrics functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an `engage_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next `engage_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn engage_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn engage_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn take_json(ptr: *mut c_char) -> Value {
        assert!(!ptr.is_null());
        unsafe {
            let value = serde_json::from_str(CStr::from_ptr(ptr).to_str().unwrap()).unwrap();
            engage_free_string(ptr);
            value
        }
    }

    fn config() -> CString {
        CString::new(r#"{"id_prefix":"ffi"}"#).unwrap()
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let config = config();
            let processor = engage_processor_new(config.as_ptr());
            assert!(!processor.is_null());

            let attach = CString::new(
                r#"{"signal":"attach","observer":"o","route_name":"Home","route_key":"Home-1"}"#,
            )
            .unwrap();
            let events = take_json(engage_processor_apply(processor, attach.as_ptr()));
            assert_eq!(events, serde_json::json!([]));

            let batch = CString::new(
                "{\"signal\":\"focus_gained\",\"observer\":\"o\"}\n\
                 {\"signal\":\"collection_mount\",\"collection_id\":\"feed\",\"observer\":\"o\"}\n\
                 {\"signal\":\"visible_items_changed\",\"collection_id\":\"feed\",\"items\":[{\"contentId\":\"A\"}]}",
            )
            .unwrap();
            let events = take_json(engage_processor_apply_ndjson(processor, batch.as_ptr()));
            assert_eq!(events[0]["event"], "view");
            assert_eq!(events[0]["view_id"], "ffi-1");
            assert_eq!(events[1]["event"], "begin_impression");
            assert_eq!(events[1]["view_id"], "ffi-1");

            let events = take_json(engage_processor_shutdown(processor));
            assert_eq!(events[0]["event"], "end_impression");
            assert_eq!(events[0]["impression_id"], "ffi-2");

            engage_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_replay() {
        let ndjson = CString::new(
            r#"{"signal":"view","route_name":"Search","route_key":"Search-1"}"#,
        )
        .unwrap();

        unsafe {
            let events = take_json(engage_replay(ndjson.as_ptr(), ptr::null()));
            assert_eq!(events.as_array().map(Vec::len), Some(1));
            assert_eq!(events[0]["route_name"], "Search");
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let processor = engage_processor_new(ptr::null());
            let invalid = CString::new("not json").unwrap();

            let result = engage_processor_apply(processor, invalid.as_ptr());
            assert!(result.is_null());

            let error = engage_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            let result = engage_processor_apply(ptr::null_mut(), invalid.as_ptr());
            assert!(result.is_null());

            engage_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_invalid_config() {
        let config = CString::new(r#"{"view_cache_capacity":0}"#).unwrap();
        unsafe {
            assert!(engage_processor_new(config.as_ptr()).is_null());
            let error = CStr::from_ptr(engage_last_error()).to_str().unwrap();
            assert!(error.contains("view_cache_capacity"));
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = engage_version();
            assert!(!version.is_null());
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
