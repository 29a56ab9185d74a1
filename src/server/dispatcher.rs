//! Request dispatch: the boundary between connection I/O and business logic.
//!
//! The dispatcher enforces the authentication gate and the single active
//! session per login invariant, then runs the registered handler on the
//! blocking pool under a concurrency bound. Handler failures of any kind
//! become error responses; nothing a handler does can close the connection.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Semaphore;

use crate::protocol::{RemoteFault, Request, Response};

use super::auth::Authenticator;
use super::connection::{ConnectionContext, ConnectionId};
use super::registry::CommandRegistry;

/// Default bound on concurrently executing handlers.
pub const DEFAULT_WORKERS: usize = 16;

/// Commands handled by the dispatcher itself rather than the registry.
const CMD_LOGIN: &str = "login";
const CMD_REGISTER: &str = "register";
/// The one registry command exempt from the authentication gate.
const CMD_HELP: &str = "help";

pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    authenticator: Arc<dyn Authenticator>,
    /// login → connection currently holding it. Shared with every worker;
    /// the entry API is the atomic arbiter for concurrent login attempts.
    active_logins: DashMap<String, ConnectionId>,
    worker_permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        authenticator: Arc<dyn Authenticator>,
        workers: usize,
    ) -> Self {
        Self {
            registry,
            authenticator,
            active_logins: DashMap::new(),
            worker_permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Process one decoded request against its connection's context and
    /// produce the response to send back. Never errors: every failure mode
    /// maps to an error `Response`.
    pub async fn dispatch(&self, request: Request, ctx: &mut ConnectionContext) -> Response {
        if request.command.is_empty() {
            return Response::success("");
        }

        if request.command == CMD_LOGIN || request.command == CMD_REGISTER {
            return self.authenticate(&request, ctx).await;
        }

        let Some(handler) = self.registry.get(&request.command) else {
            return Response::fault(RemoteFault::UnknownCommand(request.command.clone()));
        };

        if request.command != CMD_HELP && !ctx.is_authorized() {
            return Response::fault(RemoteFault::Unauthorized(format!(
                "command '{}' requires an authenticated session",
                request.command
            )));
        }

        // A vehicle-carrying request completes any outstanding follow-up.
        if request.vehicle.is_some() {
            ctx.pending_command = None;
            ctx.pending_argument = None;
        }

        let permit = match self.worker_permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return Response::fault(RemoteFault::Internal("worker pool shut down".into()))
            }
        };

        let command = request.command.clone();
        let argument = request.argument.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            handler.execute(&request)
        });

        let response = match task.await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(command = %command, error = %e, "handler returned an error");
                Response::fault(RemoteFault::Handler(e.to_string()))
            }
            Err(e) => {
                tracing::error!(command = %command, error = %e, "handler crashed");
                Response::fault(RemoteFault::Internal(format!("handler crashed: {}", e)))
            }
        };

        if response.requires_vehicle {
            ctx.pending_command = Some(command);
            ctx.pending_argument = argument;
        }
        response
    }

    /// `login`/`register`: call out to the `Authenticator`, then claim the
    /// login in the active table. The claim is what makes two simultaneous
    /// logins for one account resolve to exactly one success.
    async fn authenticate(&self, request: &Request, ctx: &mut ConnectionContext) -> Response {
        let (Some(login), Some(password)) = (request.login.clone(), request.password.clone())
        else {
            return Response::fault(RemoteFault::BadRequest(
                "login and password are required".into(),
            ));
        };
        if login.trim().is_empty() {
            return Response::fault(RemoteFault::BadRequest("login must not be empty".into()));
        }

        let registering = request.command == CMD_REGISTER;
        let authenticator = self.authenticator.clone();
        let (l, p) = (login.clone(), password);
        let verdict = tokio::task::spawn_blocking(move || {
            if registering {
                authenticator.register(&l, &p)
            } else {
                authenticator.verify(&l, &p)
            }
        })
        .await;

        let accepted = match verdict {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                tracing::error!(login = %login, error = %e, "authenticator failure");
                return Response::fault(RemoteFault::Internal(format!(
                    "authenticator failure: {}",
                    e
                )));
            }
            Err(e) => {
                return Response::fault(RemoteFault::Internal(format!(
                    "authenticator crashed: {}",
                    e
                )))
            }
        };

        if !accepted {
            return if registering {
                Response::error(format!("login '{}' is already taken", login))
            } else {
                Response::error("invalid login or password")
            };
        }

        match self.active_logins.entry(login.clone()) {
            Entry::Occupied(entry) if *entry.get() != ctx.id => {
                return Response::error(format!("user '{}' is already logged in", login));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(ctx.id);
            }
        }

        // Re-authenticating under a different name frees the old one.
        if let Some(previous) = ctx.login.replace(login.clone()) {
            if previous != login {
                self.active_logins.remove_if(&previous, |_, id| *id == ctx.id);
            }
        }
        ctx.authenticated = true;
        tracing::info!(login = %login, conn = ctx.id, registered = registering, "session authenticated");
        Response::success(if registering {
            "registration successful"
        } else {
            "authentication successful"
        })
    }

    /// Free the connection's login on teardown. `remove_if` guards against
    /// evicting a newer session that re-claimed the name.
    pub fn release(&self, ctx: &ConnectionContext) {
        if let Some(login) = &ctx.login {
            self.active_logins.remove_if(login, |_, id| *id == ctx.id);
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.active_logins.len()
    }
}

impl ConnectionContext {
    fn is_authorized(&self) -> bool {
        self.authenticated && self.login.as_deref().is_some_and(|l| !l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::auth::MemoryAuthenticator;
    use crate::server::registry::CommandHandler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    impl CommandHandler for CountingHandler {
        fn execute(&self, _request: &Request) -> anyhow::Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Response::success("done"))
        }
        fn description(&self) -> &str {
            "counts invocations"
        }
    }

    struct FailingHandler;

    impl CommandHandler for FailingHandler {
        fn execute(&self, _request: &Request) -> anyhow::Result<Response> {
            anyhow::bail!("storage unavailable")
        }
        fn description(&self) -> &str {
            "always fails"
        }
    }

    fn test_context(id: ConnectionId) -> ConnectionContext {
        let (tx, _rx) = mpsc::channel(1);
        ConnectionContext::new(id, "127.0.0.1:0".parse().unwrap(), tx)
    }

    fn dispatcher_with(
        calls: Arc<AtomicUsize>,
        authenticator: Arc<MemoryAuthenticator>,
    ) -> Dispatcher {
        let mut registry = CommandRegistry::new();
        registry.register("remove", Arc::new(CountingHandler { calls }));
        registry.register("broken", Arc::new(FailingHandler));
        Dispatcher::new(Arc::new(registry), authenticator, 4)
    }

    #[tokio::test]
    async fn empty_command_is_a_noop() {
        let dispatcher = dispatcher_with(
            Arc::new(AtomicUsize::new(0)),
            Arc::new(MemoryAuthenticator::new()),
        );
        let mut ctx = test_context(1);
        let response = dispatcher.dispatch(Request::default(), &mut ctx).await;
        assert!(response.success);
    }

    #[tokio::test]
    async fn unknown_command_is_named_in_the_fault() {
        let dispatcher = dispatcher_with(
            Arc::new(AtomicUsize::new(0)),
            Arc::new(MemoryAuthenticator::new()),
        );
        let mut ctx = test_context(1);
        let response = dispatcher
            .dispatch(Request::new("frobnicate", None), &mut ctx)
            .await;
        assert!(!response.success);
        assert_eq!(
            response.exception,
            Some(RemoteFault::UnknownCommand("frobnicate".into()))
        );
    }

    #[tokio::test]
    async fn auth_gate_blocks_without_invoking_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            dispatcher_with(calls.clone(), Arc::new(MemoryAuthenticator::new()));
        let mut ctx = test_context(1);

        let response = dispatcher
            .dispatch(Request::new("remove", Some("5".into())), &mut ctx)
            .await;

        assert!(!response.success);
        assert!(matches!(
            response.exception,
            Some(RemoteFault::Unauthorized(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn login_then_command_invokes_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let authenticator = Arc::new(MemoryAuthenticator::new().with_account("alice", "pw"));
        let dispatcher = dispatcher_with(calls.clone(), authenticator);
        let mut ctx = test_context(1);

        let login = Request::new("login", None).with_credentials("alice", "pw");
        assert!(dispatcher.dispatch(login, &mut ctx).await.success);
        assert!(ctx.authenticated);
        assert_eq!(ctx.login.as_deref(), Some("alice"));

        let response = dispatcher
            .dispatch(Request::new("remove", Some("5".into())), &mut ctx)
            .await;
        assert!(response.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_error_becomes_fault_response() {
        let authenticator = Arc::new(MemoryAuthenticator::new().with_account("alice", "pw"));
        let dispatcher = dispatcher_with(Arc::new(AtomicUsize::new(0)), authenticator);
        let mut ctx = test_context(1);
        let login = Request::new("login", None).with_credentials("alice", "pw");
        dispatcher.dispatch(login, &mut ctx).await;

        let response = dispatcher.dispatch(Request::new("broken", None), &mut ctx).await;
        assert!(!response.success);
        assert_eq!(
            response.exception,
            Some(RemoteFault::Handler("storage unavailable".into()))
        );
    }

    #[tokio::test]
    async fn second_session_for_same_login_is_rejected() {
        let authenticator = Arc::new(MemoryAuthenticator::new().with_account("alice", "pw"));
        let dispatcher = dispatcher_with(Arc::new(AtomicUsize::new(0)), authenticator);

        let mut first = test_context(1);
        let mut second = test_context(2);

        let login = Request::new("login", None).with_credentials("alice", "pw");
        assert!(dispatcher.dispatch(login.clone(), &mut first).await.success);

        let rejected = dispatcher.dispatch(login.clone(), &mut second).await;
        assert!(!rejected.success);
        assert!(rejected.message.contains("already logged in"));
        assert!(!second.authenticated);

        // Releasing the first session frees the login.
        dispatcher.release(&first);
        assert!(dispatcher.dispatch(login, &mut second).await.success);
    }

    #[tokio::test]
    async fn concurrent_logins_yield_exactly_one_success() {
        let authenticator = Arc::new(MemoryAuthenticator::new().with_account("alice", "pw"));
        let dispatcher = Arc::new(dispatcher_with(
            Arc::new(AtomicUsize::new(0)),
            authenticator,
        ));

        let mut tasks = Vec::new();
        for id in 0..2u64 {
            let dispatcher = dispatcher.clone();
            tasks.push(tokio::spawn(async move {
                let mut ctx = test_context(id);
                let login = Request::new("login", None).with_credentials("alice", "pw");
                dispatcher.dispatch(login, &mut ctx).await.success
            }));
        }

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(dispatcher.active_sessions(), 1);
    }

    #[tokio::test]
    async fn follow_up_bookkeeping_tracks_pending_command() {
        struct NeedsVehicle;
        impl CommandHandler for NeedsVehicle {
            fn execute(&self, request: &Request) -> anyhow::Result<Response> {
                if request.vehicle.is_none() {
                    Ok(Response::needs_vehicle("vehicle required"))
                } else {
                    Ok(Response::success("inserted"))
                }
            }
            fn description(&self) -> &str {
                "insert stub"
            }
        }

        let mut registry = CommandRegistry::new();
        registry.register("insert", Arc::new(NeedsVehicle));
        let authenticator = Arc::new(MemoryAuthenticator::new().with_account("alice", "pw"));
        let dispatcher = Dispatcher::new(Arc::new(registry), authenticator, 4);

        let mut ctx = test_context(1);
        let login = Request::new("login", None).with_credentials("alice", "pw");
        dispatcher.dispatch(login, &mut ctx).await;

        let first = dispatcher
            .dispatch(Request::new("insert", Some("5".into())), &mut ctx)
            .await;
        assert!(first.requires_vehicle);
        assert_eq!(ctx.pending_command.as_deref(), Some("insert"));
        assert_eq!(ctx.pending_argument.as_deref(), Some("5"));

        let vehicle = crate::model::Vehicle::new(
            1,
            "truck",
            crate::model::Coordinates { x: 1, y: 2.0 },
            90.0,
            crate::model::VehicleType::Car,
            crate::model::FuelType::Gasoline,
        );
        let second = dispatcher
            .dispatch(
                Request::new("insert", Some("5".into())).with_vehicle(vehicle),
                &mut ctx,
            )
            .await;
        assert!(second.success);
        assert!(!second.requires_vehicle);
        assert!(ctx.pending_command.is_none());
    }
}
