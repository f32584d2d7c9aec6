//! Routes inbound attribute requests to application callbacks
//!
//! The transport resolves nothing itself: it hands the dispatcher the object
//! path and raw option dictionary of each daemon call. The dispatcher finds
//! the attribute, checks its flags, runs the callback and keeps the exported
//! value cache in step. Callback failures come back as [`AccessError`]s;
//! callback panics are logged and reported as `Failed`.

use super::application::{AccessTarget, GattApplication};
use super::options::{ReadOptions, WriteOptions};
use crate::bus::{DeviceId, ObjectPath, PropertyMap};
use crate::error::{AccessError, Result};
use crate::executor::{panic_message, ExecutorHandle};
use log::{debug, error, trace};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// An inbound daemon call on an exported attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequest {
    ReadValue {
        path: ObjectPath,
        options: PropertyMap,
    },
    WriteValue {
        path: ObjectPath,
        value: Vec<u8>,
        options: PropertyMap,
    },
    StartNotify {
        path: ObjectPath,
        device: DeviceId,
    },
    StopNotify {
        path: ObjectPath,
        device: DeviceId,
    },
    /// Acknowledgement of an indication.
    Confirm {
        path: ObjectPath,
        device: DeviceId,
    },
}

impl AccessRequest {
    pub fn path(&self) -> &ObjectPath {
        match self {
            AccessRequest::ReadValue { path, .. }
            | AccessRequest::WriteValue { path, .. }
            | AccessRequest::StartNotify { path, .. }
            | AccessRequest::StopNotify { path, .. }
            | AccessRequest::Confirm { path, .. } => path,
        }
    }
}

/// Reply to an [`AccessRequest`]: the read value, the subscriber's starting
/// value, or empty for the other calls.
pub type AccessReply = std::result::Result<Vec<u8>, AccessError>;

/// Serves attribute requests against a registered [`GattApplication`]
pub struct AccessDispatcher {
    app: Arc<GattApplication>,
}

fn unknown_path(path: &ObjectPath) -> AccessError {
    AccessError::Failed(format!("no attribute at {}", path))
}

impl AccessDispatcher {
    pub fn new(app: Arc<GattApplication>) -> Self {
        Self { app }
    }

    pub fn application(&self) -> &Arc<GattApplication> {
        &self.app
    }

    fn target(&self, path: &ObjectPath) -> std::result::Result<AccessTarget, AccessError> {
        self.app.access_target(path).ok_or_else(|| unknown_path(path))
    }

    /// Runs the getter of the attribute at `path` and caches what it
    /// returned at the requested offset.
    pub fn read(&self, path: &ObjectPath, options: &ReadOptions) -> AccessReply {
        let target = self.target(path)?;
        let getter = match target.getter {
            Some(getter) if target.flags.can_read() => getter,
            _ => {
                debug!("Read of {} refused: {} is not readable", path, target.kind);
                return Err(AccessError::NotPermitted);
            }
        };

        trace!("Read {} at offset {}", path, options.offset);
        let value = guarded(path, "getter", || getter(options))?;

        target.cache.update(|cache| {
            cache.truncate(options.offset.min(cache.len()));
            cache.extend_from_slice(&value);
        });
        Ok(value)
    }

    /// Runs the setter of the attribute at `path` and splices the written
    /// bytes into the cached value.
    pub fn write(
        &self,
        path: &ObjectPath,
        value: &[u8],
        options: &WriteOptions,
    ) -> std::result::Result<(), AccessError> {
        let target = self.target(path)?;
        let setter = match target.setter {
            Some(setter) if target.flags.can_write() => setter,
            _ => {
                debug!("Write of {} refused: {} is not writable", path, target.kind);
                return Err(AccessError::NotPermitted);
            }
        };

        trace!(
            "Write {} bytes to {} at offset {}",
            value.len(),
            path,
            options.offset
        );
        guarded(path, "setter", || setter(value, options))?;

        target.cache.update(|cache| {
            let start = options.offset.min(cache.len());
            let end = (start + value.len()).min(cache.len());
            cache.splice(start..end, value.iter().copied());
        });
        Ok(())
    }

    pub fn start_notify(&self, path: &ObjectPath, device: DeviceId) -> AccessReply {
        let id = self
            .target(path)?
            .characteristic
            .ok_or(AccessError::NotSupported)?;
        self.app.subscribe(id, device)
    }

    pub fn stop_notify(
        &self,
        path: &ObjectPath,
        device: &DeviceId,
    ) -> std::result::Result<(), AccessError> {
        let id = self
            .target(path)?
            .characteristic
            .ok_or(AccessError::NotSupported)?;
        self.app.unsubscribe(id, device)
    }

    /// Acknowledgement of an indication from `device`.
    pub fn confirm(
        &self,
        path: &ObjectPath,
        device: &DeviceId,
    ) -> std::result::Result<(), AccessError> {
        let id = self
            .target(path)?
            .characteristic
            .ok_or(AccessError::NotSupported)?;
        self.app.acknowledge(id, device)
    }

    pub fn device_disconnected(&self, device: &DeviceId) {
        debug!("{} disconnected", device);
        self.app.device_disconnected(device);
    }

    /// Serves one raw daemon call.
    pub fn handle(&self, request: AccessRequest) -> AccessReply {
        let default_mtu = self.app.config().default_mtu;
        match request {
            AccessRequest::ReadValue { path, options } => {
                self.read(&path, &ReadOptions::from_properties(&options, default_mtu))
            }
            AccessRequest::WriteValue {
                path,
                value,
                options,
            } => {
                let options = WriteOptions::from_properties(&options, default_mtu)?;
                self.write(&path, &value, &options).map(|()| Vec::new())
            }
            AccessRequest::StartNotify { path, device } => self.start_notify(&path, device),
            AccessRequest::StopNotify { path, device } => {
                self.stop_notify(&path, &device).map(|()| Vec::new())
            }
            AccessRequest::Confirm { path, device } => {
                self.confirm(&path, &device).map(|()| Vec::new())
            }
        }
    }

    /// Queues `request` on the executor and passes the reply to `reply`
    /// once served. Requests are served in the order they are dispatched.
    pub fn dispatch<F>(
        self: &Arc<Self>,
        executor: &ExecutorHandle,
        request: AccessRequest,
        reply: F,
    ) -> Result<()>
    where
        F: FnOnce(AccessReply) + Send + 'static,
    {
        let dispatcher = Arc::clone(self);
        executor.submit(move || reply(dispatcher.handle(request)))
    }
}

/// Runs an application callback, turning a panic into `Failed`.
fn guarded<T, F>(path: &ObjectPath, what: &str, f: F) -> std::result::Result<T, AccessError>
where
    F: FnOnce() -> std::result::Result<T, AccessError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("The {} of {} panicked: {}", what, path, message);
            Err(AccessError::Failed(format!("internal error in {}", what)))
        }
    }
}
