pub mod states;

use crate::client::WebSocketClient;
use crate::config::ClientConfig;
use crate::traits::*;
use states::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error};

/// How long a handler thread blocks on its channel before re-checking the
/// shutdown flag
const HANDLER_POLL_INTERVAL: Duration = Duration::from_millis(50);

type HandlerEntry<M> = (
    crossbeam_channel::Sender<M>,
    crossbeam_channel::Receiver<M>,
    Box<dyn MessageHandler<M>>,
);

/// Type-state builder for [`WebSocketClient`]
///
/// `url` and `router` must both be set before `build()` is available.
/// `P` carries the router and its routing table once `router()` is called.
pub struct WebSocketClientBuilder<U, Ro, P>
where
    U: UrlState,
    Ro: RouterState,
{
    _state: TypeState<U, Ro>,
    url: Option<String>,
    routing: P,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    discard_first_message: bool,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

/// Router plus the handlers registered for its route keys
pub struct Routing<R>
where
    R: MessageRouter,
{
    router: R,
    routes: RoutingBuilder<R>,
}

impl WebSocketClientBuilder<NoUrl, NoRouter, ()> {
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            url: None,
            routing: (),
            reconnect_strategy: None,
            discard_first_message: false,
            shutdown_flag: None,
        }
    }
}

impl Default for WebSocketClientBuilder<NoUrl, NoRouter, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U, Ro, P> WebSocketClientBuilder<U, Ro, P>
where
    U: UrlState,
    Ro: RouterState,
{
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Treat the first payload of every connection as a handshake token and
    /// drop it without parsing
    pub fn discard_first_message(mut self) -> Self {
        self.discard_first_message = true;
        self
    }

    /// Share a shutdown flag with other components
    ///
    /// The client only runs while the flag is `true`. Storing `false` stops
    /// delivery, cancels any pending reconnect, and lets the task exit.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }
}

// URL setting
impl<Ro, P> WebSocketClientBuilder<NoUrl, Ro, P>
where
    Ro: RouterState,
{
    pub fn url(self, url: impl Into<String>) -> WebSocketClientBuilder<HasUrl, Ro, P> {
        WebSocketClientBuilder {
            _state: TypeState::new(),
            url: Some(url.into()),
            routing: self.routing,
            reconnect_strategy: self.reconnect_strategy,
            discard_first_message: self.discard_first_message,
            shutdown_flag: self.shutdown_flag,
        }
    }
}

/// Collects one handler per route key
pub struct RoutingBuilder<R>
where
    R: MessageRouter,
{
    handlers: HashMap<R::RouteKey, HandlerEntry<R::Message>>,
}

impl<R> RoutingBuilder<R>
where
    R: MessageRouter,
{
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Add a handler for a specific route key
    pub fn handler<H>(mut self, route_key: R::RouteKey, handler: H) -> Self
    where
        H: MessageHandler<R::Message>,
    {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.handlers
            .insert(route_key, (sender, receiver, Box::new(handler)));
        self
    }

    fn spawn(
        self,
        shutdown_flag: Arc<AtomicBool>,
    ) -> (
        HashMap<R::RouteKey, crossbeam_channel::Sender<R::Message>>,
        Vec<JoinHandle<()>>,
    ) {
        let mut senders = HashMap::new();
        let mut handles = Vec::new();

        for (route_key, (sender, receiver, mut handler)) in self.handlers {
            senders.insert(route_key.clone(), sender);
            let shutdown_flag = Arc::clone(&shutdown_flag);

            handles.push(std::thread::spawn(move || loop {
                match receiver.recv_timeout(HANDLER_POLL_INTERVAL) {
                    Ok(message) => {
                        // Anything still queued when shutdown starts is dropped
                        if !shutdown_flag.load(Ordering::Acquire) {
                            debug!("Shutdown flag set, dropping message for route {:?}", route_key);
                            break;
                        }
                        if let Err(e) = handler.handle(message) {
                            error!("Handler error for route {:?}: {}", route_key, e);
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        if !shutdown_flag.load(Ordering::Acquire) {
                            debug!("Shutdown flag detected, handler thread for route {:?} exiting", route_key);
                            break;
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                        debug!("Handler channel closed for route {:?}, thread exiting", route_key);
                        break;
                    }
                }
            }));
        }

        (senders, handles)
    }
}

// Router setting
impl<U> WebSocketClientBuilder<U, NoRouter, ()>
where
    U: UrlState,
{
    pub fn router<R, F>(
        self,
        router: R,
        configure_routing: F,
    ) -> WebSocketClientBuilder<U, HasRouter, Routing<R>>
    where
        R: MessageRouter,
        F: FnOnce(RoutingBuilder<R>) -> RoutingBuilder<R>,
    {
        WebSocketClientBuilder {
            _state: TypeState::new(),
            url: self.url,
            routing: Routing {
                router,
                routes: configure_routing(RoutingBuilder::new()),
            },
            reconnect_strategy: self.reconnect_strategy,
            discard_first_message: self.discard_first_message,
            shutdown_flag: self.shutdown_flag,
        }
    }
}

// Build method - only available when all required fields are set
impl<R> WebSocketClientBuilder<HasUrl, HasRouter, Routing<R>>
where
    R: MessageRouter,
{
    /// Spawn the handler threads and the connection task
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<WebSocketClient<R>> {
        let url = self
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| FeedError::Configuration("URL must be set".into()))?;

        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(FeedError::Configuration(format!(
                "unsupported URL scheme: {}",
                url
            )));
        }

        let shutdown_flag = self
            .shutdown_flag
            .unwrap_or_else(|| Arc::new(AtomicBool::new(true)));

        let reconnect_strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(ExponentialBackoff::default()));

        let Routing { router, routes } = self.routing;
        let (route_senders, handler_handles) = routes.spawn(Arc::clone(&shutdown_flag));

        let config = ClientConfig {
            url,
            router: Arc::new(router),
            route_senders,
            reconnect_strategy,
            discard_first_message: self.discard_first_message,
            shutdown_flag,
        };

        Ok(WebSocketClient::new(config, handler_handles))
    }
}
