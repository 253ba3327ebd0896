//! Fakes and fixtures shared by unit and integration tests.

use std::collections::HashSet;
use std::io::{self, Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use crate::catalog::{GameDescriptor, Origin};
use crate::engine::Engine;
use crate::input::Key;
use crate::runtime::{ModuleHost, Runtime};

/// Build an in-memory ZIP archive from `(path, contents)` pairs.
pub fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file::<_, ()>(*name, Default::default())
            .expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Encode a solid-colour PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0x9d, 0xb8, 0x92, 0xff]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// An imported catalog entry carrying `payload`.
pub fn imported_descriptor(id: &str, name: &str, payload: &[u8]) -> GameDescriptor {
    GameDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        vendor: "Unknown".to_string(),
        version: "1.0".to_string(),
        description: String::new(),
        size_label: "1KB".to_string(),
        icon: None,
        payload: Some(payload.to_vec()),
        origin: Origin::Imported,
        imported_at: Some(Utc::now()),
    }
}

/// A call observed by [`FakeRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    SetNamespace(String),
    /// Archive length in bytes.
    LoadArchive(usize),
    KeyPress(String),
    KeyRelease(String),
    Stop,
}

/// Runtime that records every call.
#[derive(Default)]
pub struct FakeRuntime {
    calls: Mutex<Vec<RuntimeCall>>,
    fail_next: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn load_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RuntimeCall::LoadArchive(_)))
            .count()
    }

    /// Make the next `load_archive` fail.
    pub fn fail_next_load(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Hold every `load_archive` until a permit is added to the returned
    /// semaphore.
    pub fn gate_loads(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Runtime for FakeRuntime {
    async fn load_archive(&self, archive: &[u8]) -> io::Result<()> {
        self.record(RuntimeCall::LoadArchive(archive.len()));
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.map_err(io::Error::other)?.forget();
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(io::Error::other("corrupt class file"));
        }
        Ok(())
    }

    fn stop(&self) {
        self.record(RuntimeCall::Stop);
    }

    fn send_key_press(&self, key: &str) {
        self.record(RuntimeCall::KeyPress(key.to_string()));
    }

    fn send_key_release(&self, key: &str) {
        self.record(RuntimeCall::KeyRelease(key.to_string()));
    }

    fn set_storage_namespace(&self, namespace: &str) {
        self.record(RuntimeCall::SetNamespace(namespace.to_string()));
    }
}

/// Module host that loads instantly and logs every load attempt.
#[derive(Default)]
pub struct FakeHost {
    loaded: Mutex<HashSet<String>>,
    log: Mutex<Vec<String>>,
    fail_once: Mutex<HashSet<String>>,
    runtime: Option<Arc<dyn Runtime>>,
}

impl FakeHost {
    /// Host whose runtime never appears.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime(runtime: Arc<FakeRuntime>) -> Self {
        Self {
            runtime: Some(runtime),
            ..Self::default()
        }
    }

    /// Modules passed to `load_module`, in call order.
    pub fn load_log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn fail_module_once(&self, module: &str) {
        self.fail_once.lock().unwrap().insert(module.to_string());
    }

    /// Mark a module as already present on the host.
    pub fn preload(&self, module: &str) {
        self.loaded.lock().unwrap().insert(module.to_string());
    }
}

#[async_trait]
impl ModuleHost for FakeHost {
    fn is_loaded(&self, module: &str) -> bool {
        self.loaded.lock().unwrap().contains(module)
    }

    async fn load_module(&self, module: &str) -> io::Result<()> {
        self.log.lock().unwrap().push(module.to_string());
        if self.fail_once.lock().unwrap().remove(module) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "script error"));
        }
        self.loaded.lock().unwrap().insert(module.to_string());
        Ok(())
    }

    fn runtime(&self) -> Option<Arc<dyn Runtime>> {
        self.runtime.clone()
    }
}

// ---------------------------------------------------------------------------
// Engine contract tests
// ---------------------------------------------------------------------------

/// Starting twice leaves one running engine; stopping twice is harmless.
pub async fn contract_start_stop_idempotent(engine: &mut dyn Engine) {
    engine.start().await.expect("first start");
    engine.start().await.expect("second start");
    assert!(engine.is_running(), "{} should run after start", engine.name());

    engine.stop();
    engine.stop();
    assert!(!engine.is_running(), "{} should stop", engine.name());
}

/// Input delivered to a stopped engine must not panic.
pub fn contract_input_when_stopped(engine: &mut dyn Engine) {
    engine.stop();
    for key in [Key::Up, Key::Select, Key::Back, Key::Digit(5), Key::Star] {
        engine.handle_input(&key);
    }
    assert!(!engine.is_running());
}

/// Engines without save support must say so consistently.
pub fn contract_save_support_consistent(engine: &mut dyn Engine) {
    if !engine.supports_save() {
        assert!(engine.save_state().is_err());
        assert!(engine.load_state().is_err());
    }
}
