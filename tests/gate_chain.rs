//! End-to-end behaviour of the standard gate chain

use chat_gatekeeper::audit::MemoryAuditSink;
use chat_gatekeeper::middleware::RateLimitStore;
use chat_gatekeeper::{
    AuthenticatedUser, ChainOutcome, ChainState, GateChain, GateRequest, GatekeeperConfig, RejectionKind, Role,
};
use chrono::{DateTime, Duration, Local, TimeZone};
use hyper::Method;
use std::sync::Arc;

fn evening() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 5, 17, 19, 0, 0).unwrap()
}

fn host() -> AuthenticatedUser {
    AuthenticatedUser {
        id: "3".to_string(),
        username: "hank".to_string(),
        role: Role::Host,
    }
}

fn post_at(offset_secs: i64) -> GateRequest {
    GateRequest::new(Method::POST, "/api/conversations/1/messages/", evening() + Duration::seconds(offset_secs))
        .with_remote_addr("10.0.0.9")
        .with_forwarded_for("1.2.3.4")
        .with_user(host())
}

fn standard_chain() -> (GateChain, MemoryAuditSink, Arc<RateLimitStore>) {
    let sink = MemoryAuditSink::new();
    let store = Arc::new(RateLimitStore::new());
    let chain = GateChain::from_config(&GatekeeperConfig::default(), Arc::new(sink.clone()), Arc::clone(&store));
    (chain, sink, store)
}

#[test]
fn test_host_posting_messages_hits_rate_limit() {
    let (chain, sink, store) = standard_chain();

    for t in 0..5 {
        assert!(chain.evaluate(&post_at(t)).is_admitted(), "t={}", t);
    }

    let outcome = chain.evaluate(&post_at(5));
    assert_eq!(
        outcome.rejection().map(|r| r.message.as_str()),
        Some("Too many messages from your IP address. Limit is 5 messages per 60 seconds.")
    );

    assert!(chain.evaluate(&post_at(61)).is_admitted());

    // Every request is audited, rejected or not
    assert_eq!(sink.lines().len(), 7);
    assert!(sink.lines().iter().all(|line| line.ends_with("- User: hank - Path: /api/conversations/1/messages/")));
    assert_eq!(store.tracked_clients(), 1);
}

#[test]
fn test_reads_are_never_throttled() {
    let (chain, _sink, _store) = standard_chain();

    for t in 0..50 {
        let mut req = post_at(t);
        req.method = Method::GET;
        assert!(chain.evaluate(&req).is_admitted());
    }
}

#[test]
fn test_guest_is_rejected_after_rate_check() {
    let (chain, _sink, _store) = standard_chain();
    let req = GateRequest::new(Method::GET, "/api/conversations/", evening()).with_user(AuthenticatedUser {
        id: "4".to_string(),
        username: "gus".to_string(),
        role: Role::Guest,
    });

    match chain.evaluate(&req) {
        ChainOutcome::Rejected { gate, after, rejection } => {
            assert_eq!(gate, "role_permission");
            assert_eq!(after, ChainState::RateChecked);
            assert_eq!(rejection.kind, RejectionKind::ForbiddenRole);
            assert_eq!(
                rejection.message,
                "Your role (guest) does not have permission to access this resource."
            );
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_outside_hours_rejected_before_rate_accounting() {
    let (chain, _sink, store) = standard_chain();
    let late = evening() + Duration::hours(3);
    let req = GateRequest::new(Method::POST, "/api/messages/", late)
        .with_remote_addr("1.2.3.4")
        .with_user(host());

    let outcome = chain.evaluate(&req);
    assert_eq!(outcome.rejection().map(|r| r.kind), Some(RejectionKind::ForbiddenTimeWindow));
    assert_eq!(store.tracked_clients(), 0);
}
