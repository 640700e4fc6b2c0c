//! `FsRequest` — the host's record of one filesystem operation.
//!
//! The engine only ever sees the correlation token and the callback
//! presence; the host keeps the request and, when a [`Completion`] for its
//! token is reaped, calls [`FsRequest::complete`].
//!
//! [`Completion`]: crate::engine::Completion

use crate::engine::EngineId;

pub type Callback = Box<dyn FnOnce(i32)>;

pub struct FsRequest {
    token: u64,
    callback: Option<Callback>,
    /// Set while the request is in flight on an engine.
    engine: Option<EngineId>,
    result: Option<i32>,
}

impl FsRequest {
    pub fn new(token: u64) -> Self {
        Self { token, callback: None, engine: None, result: None }
    }

    /// Attach the completion callback. Requests without one are
    /// synchronous and are refused by the engine.
    pub fn with_callback(mut self, f: impl FnOnce(i32) + 'static) -> Self {
        self.callback = Some(Box::new(f));
        self
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Bytes transferred or a negative errno, once known.
    pub fn result(&self) -> Option<i32> {
        self.result
    }

    /// Engine the request is in flight on, if any.
    pub fn admitted_to(&self) -> Option<EngineId> {
        self.engine
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn is_canceled(&self) -> bool {
        self.result == Some(-libc::ECANCELED)
    }

    pub(crate) fn admit(&mut self, id: EngineId) {
        self.engine = Some(id);
    }

    pub(crate) fn mark_canceled(&mut self) {
        self.result = Some(-libc::ECANCELED);
    }

    /// Record the kernel result and run the callback once.
    ///
    /// A canceled request keeps `-ECANCELED`; the late kernel result is
    /// discarded.
    pub fn complete(&mut self, res: i32) {
        self.engine = None;
        let res = if self.is_canceled() { -libc::ECANCELED } else { res };
        self.result = Some(res);
        if let Some(cb) = self.callback.take() {
            cb(res);
        }
    }
}

impl std::fmt::Debug for FsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsRequest")
            .field("token", &self.token)
            .field("has_callback", &self.callback.is_some())
            .field("engine", &self.engine)
            .field("result", &self.result)
            .finish()
    }
}
