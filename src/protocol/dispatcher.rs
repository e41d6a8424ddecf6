use crate::core::command::Command;
use crate::core::request::Request;
use crate::core::response::Response;
use crate::error::constants::{ERR_DISPATCHER_READ_LOCK, ERR_DISPATCHER_WRITE_LOCK};
use crate::error::{GatewayError, Result};
use crate::session::{FrameHandler, Session};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

type HandlerFn = dyn Fn(&Session, &Request) -> Result<Bytes> + Send + Sync + 'static;

/// Error code returned for a (command, sub-command) pair with no handler
pub const CODE_NOT_FOUND: i32 = 404;

/// Request dispatcher keyed by (command, sub-command).
///
/// Handler errors become error responses; an unknown route answers with
/// [`CODE_NOT_FOUND`]. An empty payload from a handler means "no reply".
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<(Command, Command), Box<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register<F>(
        &self,
        command: impl Into<Command>,
        sub_command: impl Into<Command>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(&Session, &Request) -> Result<Bytes> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| GatewayError::Custom(ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        handlers.insert((command.into(), sub_command.into()), Box::new(handler));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a decoded request to its handler and build the response
    pub fn dispatch(&self, session: &Session, req: &Request) -> Result<Response> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| GatewayError::Custom(ERR_DISPATCHER_READ_LOCK.to_string()))?;

        let Some(handler) = handlers.get(&(req.command, req.sub_command)) else {
            debug!(command = %req.command, sub_command = %req.sub_command, "No handler registered");
            return Ok(Response::failure(req, CODE_NOT_FOUND));
        };

        Ok(match handler(session, req) {
            Ok(payload) => Response::reply(req, payload),
            Err(e) => {
                trace!(seq = req.seq_id, error = %e, "Handler failed");
                Response::failure(req, e)
            }
        })
    }
}

impl FrameHandler for Dispatcher {
    fn handle(&self, session: &Session, frame: Bytes) -> Result<Option<Bytes>> {
        let req = Request::unmarshal(&frame)?;
        req.validate()?;

        let resp = self.dispatch(session, &req)?;
        if !resp.is_error() && resp.payload.is_empty() {
            return Ok(None);
        }
        resp.marshal().map(Some)
    }
}
