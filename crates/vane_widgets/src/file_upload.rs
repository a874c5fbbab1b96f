//! Single-file uploader
//!
//! Builds a `form.fileupload-form` holding an `input.fileupload-input` inside
//! the main element. Choosing a file (or calling [`FileUpload::select`])
//! checks the size limit and hands an [`UploadRequest`] to the configured
//! [`Transport`]. The transport answers through the [`UploadReply`] it was
//! given; replies for an upload that already ended are ignored.
//!
//! Progress is simulated: a widget timer ticks every second and reports the
//! elapsed share of `duration` until the reply arrives or time runs out.
//!
//! Events: `filechange`, `start`, `progress(percent)`, `end`, `done(data)`,
//! `fail(reason)`, `retry`. The `fail` argument is an object with a `state`
//! key (`limit`, `timeout`, `backendFail`, `parseError`) plus `statusCode`
//! or `error` when they are known.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use serde::Deserialize;
use vane_core::dom::{Dom, NodeId, TimerId};
use vane_core::{
    Attribute, Lifecycle, Map, Options, Registry, Result, Schema, Value, WeakWidget, Widget,
    WidgetError,
};

/// Registered type name
pub const FILE_UPLOAD: &str = "FileUpload";

/// Progress tick in milliseconds
pub const PROGRESS_TICK: u64 = 1000;

const MEGABYTE: f64 = 1024.0 * 1024.0;

/// Where an upload stands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    Init,
    Pending,
    Done,
    Fail,
}

/// Why an upload failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailReason {
    /// File larger than `limit` megabytes
    Limit,
    /// No reply within `duration`
    Timeout,
    /// Server answered with a non-zero `status`
    BackendFail,
    /// Unreadable body or non-2xx status
    ParseError,
}

impl FailReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailReason::Limit => "limit",
            FailReason::Timeout => "timeout",
            FailReason::BackendFail => "backendFail",
            FailReason::ParseError => "parseError",
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The file picked by the user
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub mime: String,
}

/// Everything a transport needs to post one file
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub action: String,
    /// Form field carrying the file
    pub field_name: String,
    pub file: UploadFile,
    /// Extra form fields passed through unchanged
    pub params: Map,
}

/// Sends uploads on behalf of a [`FileUpload`]
pub trait Transport {
    fn send(&self, request: UploadRequest, reply: UploadReply);

    /// Drop the request in flight, if any
    fn abort(&self) {}
}

/// Completion handle for one upload attempt
pub struct UploadReply {
    widget: WeakWidget,
    generation: u64,
}

impl fmt::Debug for UploadReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadReply")
            .field("generation", &self.generation)
            .field("alive", &self.widget.is_alive())
            .finish()
    }
}

impl UploadReply {
    /// Deliver the HTTP status and body of the response
    ///
    /// Ignored when the widget is gone or the attempt already ended.
    pub fn complete(self, status: u16, body: &str) {
        let Some(upload) = self.widget.upgrade().and_then(|w| FileUpload::from_widget(&w)) else {
            return;
        };
        let runtime = &upload.runtime;
        if runtime.generation.get() != self.generation || runtime.state.get() != UploadState::Pending {
            tracing::debug!(id = %upload.id(), generation = self.generation, "stale upload reply dropped");
            return;
        }

        match interpret(status, body) {
            Ok(data) => runtime.done(&upload.widget, data),
            Err(reason) => runtime.fail(&upload.widget, reason),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    status: serde_json::Value,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default, rename = "statusInfo")]
    status_info: serde_json::Value,
}

fn failure(reason: FailReason, status_code: Option<u16>, error: Option<Value>) -> Value {
    let mut map = Map::new();
    map.insert("state".into(), reason.as_str().into());
    if let Some(code) = status_code {
        map.insert("statusCode".into(), u32::from(code).into());
    }
    if let Some(error) = error {
        map.insert("error".into(), error);
    }
    Value::from(map)
}

/// Map a response to the `done` payload or the `fail` argument
pub(crate) fn interpret(status: u16, body: &str) -> std::result::Result<Value, Value> {
    if !(200..300).contains(&status) {
        return Err(failure(FailReason::ParseError, Some(status), None));
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) if envelope.status.as_f64() == Some(0.0) => Ok(Value::from(envelope.data)),
        Ok(envelope) => Err(failure(
            FailReason::BackendFail,
            None,
            Some(Value::from(envelope.status_info)),
        )),
        Err(_) => Err(failure(FailReason::ParseError, Some(status), None)),
    }
}

/// The file currently chosen in `input`, read from its `value` and
/// `data-size`/`data-type`
fn selected_file(dom: &Dom, input: NodeId) -> Option<UploadFile> {
    let name = dom.get_attribute(input, "value").filter(|v| !v.is_empty())?;
    Some(UploadFile {
        name,
        size: dom
            .get_data(input, "size")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default(),
        mime: dom.get_data(input, "type").unwrap_or_default(),
    })
}

fn number(widget: &Widget, name: &str) -> f64 {
    widget.get(name).as_f64().unwrap_or_default()
}

/// Runtime data of one uploader
pub struct FileUploadRuntime {
    transport: Rc<dyn Transport>,
    form: Cell<Option<NodeId>>,
    input: Cell<Option<NodeId>>,
    state: Cell<UploadState>,
    file: RefCell<Option<UploadFile>>,
    /// Bumped per attempt so late replies can be recognised
    generation: Cell<u64>,
    started_at: Cell<u64>,
    tick: Cell<Option<TimerId>>,
}

impl fmt::Debug for FileUploadRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUploadRuntime")
            .field("state", &self.state.get())
            .field("file", &*self.file.borrow())
            .field("generation", &self.generation.get())
            .finish_non_exhaustive()
    }
}

impl FileUploadRuntime {
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self {
            transport,
            form: Cell::new(None),
            input: Cell::new(None),
            state: Cell::new(UploadState::Init),
            file: RefCell::new(None),
            generation: Cell::new(0),
            started_at: Cell::new(0),
            tick: Cell::new(None),
        }
    }

    pub fn state(&self) -> UploadState {
        self.state.get()
    }

    pub fn form(&self) -> Option<NodeId> {
        self.form.get()
    }

    pub fn input(&self) -> Option<NodeId> {
        self.input.get()
    }

    pub fn file(&self) -> Option<UploadFile> {
        self.file.borrow().clone()
    }

    fn post(&self, widget: &Widget, file: UploadFile) {
        self.file.replace(Some(file.clone()));

        if file.size as f64 >= number(widget, "limit") * MEGABYTE {
            self.fail(widget, failure(FailReason::Limit, None, None));
            return;
        }

        self.state.set(UploadState::Pending);
        widget.emit("start", &[]);
        self.start_ticking(widget);

        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let request = UploadRequest {
            action: widget.get("action").to_js_string(),
            field_name: widget.get("name").to_js_string(),
            file,
            params: widget.get("params").as_object().cloned().unwrap_or_default(),
        };
        tracing::debug!(id = %widget.id(), action = %request.action, file = %request.file.name, "upload started");

        self.transport.send(
            request,
            UploadReply {
                widget: widget.downgrade(),
                generation,
            },
        );
    }

    fn progress(&self, widget: &Widget, share: f64) {
        let percent = (share * 100.0).trunc() as i64;
        widget.emit("progress", &[Value::from(percent)]);
    }

    fn start_ticking(&self, widget: &Widget) {
        self.stop_ticking(widget);
        self.started_at.set(widget.dom().timers().now());
        self.step(widget);
    }

    fn step(&self, widget: &Widget) {
        let elapsed = widget.dom().timers().now() - self.started_at.get();
        let duration = number(widget, "duration");
        let share = if duration > 0.0 { elapsed as f64 / duration } else { 1.0 };

        if share >= 1.0 {
            self.transport.abort();
            self.fail(widget, failure(FailReason::Timeout, None, None));
            return;
        }

        self.progress(widget, share);
        let tick = widget.set_timeout(PROGRESS_TICK, |widget| {
            if let Some(upload) = FileUpload::from_widget(widget) {
                upload.runtime.tick.set(None);
                upload.runtime.step(widget);
            }
        });
        self.tick.set(Some(tick));
    }

    fn stop_ticking(&self, widget: &Widget) {
        if let Some(tick) = self.tick.take() {
            widget.clear_timeout(tick);
        }
    }

    fn done(&self, widget: &Widget, data: Value) {
        self.progress(widget, 1.0);
        self.stop_ticking(widget);
        self.state.set(UploadState::Done);
        widget.emit("end", &[]);
        widget.emit("done", &[data]);
    }

    fn fail(&self, widget: &Widget, reason: Value) {
        self.stop_ticking(widget);
        // Late replies to this attempt must not land
        self.generation.set(self.generation.get() + 1);
        self.state.set(UploadState::Fail);
        tracing::debug!(id = %widget.id(), %reason, "upload failed");
        widget.emit("end", &[]);
        widget.emit("fail", &[reason]);
    }

    fn select(&self, widget: &Widget, file: UploadFile) {
        if file.name.is_empty() {
            return;
        }
        self.post(widget, file);
        widget.emit("filechange", &[]);
    }

    fn retry(&self, widget: &Widget) {
        if self.state.get() != UploadState::Fail {
            return;
        }
        let Some(file) = self.file() else {
            return;
        };
        self.post(widget, file);
        widget.emit("retry", &[]);
    }

    fn abort(&self, widget: &Widget) {
        if self.state.get() != UploadState::Pending {
            return;
        }
        self.transport.abort();
        self.stop_ticking(widget);
        self.generation.set(self.generation.get() + 1);
        self.state.set(UploadState::Init);
    }
}

impl Lifecycle for FileUploadRuntime {
    fn type_name(&self) -> &'static str {
        FILE_UPLOAD
    }

    fn attributes(&self) -> Schema {
        Schema::new()
            .with("name", Attribute::new("file"))
            .with("accept", Attribute::new("image/*"))
            .with("action", Attribute::new(""))
            .with("params", Attribute::new(Map::new()))
            .with("limit", Attribute::new(3))
            .with("duration", Attribute::new(30000))
    }

    fn init_structure(&self, widget: &Widget) -> Result<()> {
        let main = widget
            .main()
            .ok_or_else(|| WidgetError::MissingMain(FILE_UPLOAD.into()))?;
        let dom = widget.dom();
        dom.add_class(main, "fileupload");

        let form = dom.create_element("form");
        dom.set_attribute(form, "enctype", "multipart/form-data");
        dom.set_attribute(form, "method", "post");
        dom.add_class(form, "fileupload-form");

        let input = dom.create_element("input");
        dom.set_attribute(input, "type", "file");
        dom.set_attribute(input, "name", widget.get("name").to_js_string());
        let accept = widget.get("accept");
        dom.set_attribute(
            input,
            "accept",
            if accept.is_truthy() { accept.to_js_string() } else { String::new() },
        );
        dom.add_class(input, "fileupload-input");

        dom.append_child(form, input);
        dom.append_child(main, form);

        self.form.set(Some(form));
        self.input.set(Some(input));
        self.state.set(UploadState::Init);
        Ok(())
    }

    fn init_event(&self, widget: &Widget) -> Result<()> {
        let Some(input) = self.input.get() else {
            return Ok(());
        };
        widget.on_dom(input, "change", |widget, event| {
            let Some(upload) = FileUpload::from_widget(widget) else {
                return;
            };
            let input = event.target().node();
            if let Some(file) = input.and_then(|input| selected_file(widget.dom(), input)) {
                upload.runtime.select(widget, file);
            }
        });
        Ok(())
    }

    fn dispose(&self, widget: &Widget) {
        self.abort(widget);
        self.stop_ticking(widget);
    }
}

/// Handle to an uploader widget
#[derive(Clone, Debug)]
pub struct FileUpload {
    widget: Widget,
    runtime: Rc<FileUploadRuntime>,
}

impl Deref for FileUpload {
    type Target = Widget;

    fn deref(&self) -> &Widget {
        &self.widget
    }
}

impl FileUpload {
    pub fn new(registry: &Registry, transport: Rc<dyn Transport>, options: Options) -> Result<Self> {
        let runtime = Rc::new(FileUploadRuntime::new(transport));
        let widget = Widget::new(registry, runtime.clone(), options)?;
        Ok(Self { widget, runtime })
    }

    /// Register the `FileUpload` type; every instance posts through
    /// `transport`
    pub fn register(registry: &Registry, transport: Rc<dyn Transport>) -> Result<()> {
        registry.register(FILE_UPLOAD, move |registry, options| {
            Ok(FileUpload::new(registry, transport.clone(), options)?.into_widget())
        })
    }

    /// The uploader behind `widget`, if it is one
    pub fn from_widget(widget: &Widget) -> Option<Self> {
        let runtime = widget.behavior::<FileUploadRuntime>()?;
        Some(Self {
            widget: widget.clone(),
            runtime,
        })
    }

    pub fn widget(&self) -> &Widget {
        &self.widget
    }

    pub fn into_widget(self) -> Widget {
        self.widget
    }

    pub fn runtime(&self) -> &FileUploadRuntime {
        &self.runtime
    }

    pub fn state(&self) -> UploadState {
        self.runtime.state()
    }

    /// Upload `file` as if it had been chosen in the input
    pub fn select(&self, file: UploadFile) {
        self.runtime.select(&self.widget, file);
    }

    /// Post the last file again after a failure
    pub fn retry(&self) {
        self.runtime.retry(&self.widget);
    }

    /// Cancel the upload in flight without emitting `end`
    pub fn abort(&self) {
        self.runtime.abort(&self.widget);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_of(value: &Value) -> Option<&str> {
        value.get("state").and_then(Value::as_str)
    }

    #[test]
    fn test_interpret_success() {
        let data = interpret(200, r#"{"status":0,"data":{"url":"/a.png"}}"#).unwrap();
        assert_eq!(data.get("url").and_then(Value::as_str), Some("/a.png"));
    }

    #[test]
    fn test_interpret_backend_fail_carries_status_info() {
        let reason = interpret(201, r#"{"status":1,"statusInfo":"too big"}"#).unwrap_err();
        assert_eq!(state_of(&reason), Some("backendFail"));
        assert_eq!(reason.get("error").and_then(Value::as_str), Some("too big"));
        assert!(reason.get("statusCode").is_none());
    }

    #[test]
    fn test_interpret_parse_errors() {
        let reason = interpret(200, "<html>").unwrap_err();
        assert_eq!(state_of(&reason), Some("parseError"));
        assert_eq!(reason.get("statusCode").and_then(Value::as_i64), Some(200));

        let reason = interpret(200, "null").unwrap_err();
        assert_eq!(state_of(&reason), Some("parseError"));

        let reason = interpret(500, r#"{"status":0}"#).unwrap_err();
        assert_eq!(state_of(&reason), Some("parseError"));
        assert_eq!(reason.get("statusCode").and_then(Value::as_i64), Some(500));
    }

    #[test]
    fn test_missing_status_is_backend_fail() {
        let reason = interpret(200, "{}").unwrap_err();
        assert_eq!(state_of(&reason), Some("backendFail"));
    }

    #[test]
    fn test_fail_reason_names() {
        assert_eq!(FailReason::Limit.to_string(), "limit");
        assert_eq!(FailReason::Timeout.as_str(), "timeout");
    }
}
