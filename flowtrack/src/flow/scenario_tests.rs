//! End-to-end scenarios exercising stages, the registry, and dispatchers
//! together through a flow.

#[cfg(test)]
mod tests {
    use crate::dispatch::{DispatchMode, DispatcherConfig};
    use crate::flow::Flow;
    use crate::forward::{CollectingForwarder, Forwarder, NoOpForwarder};
    use crate::message::Message;
    use crate::stage::{StageHandler, StageIdentity};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn passthrough() -> StageHandler {
        StageHandler::implicit_fn(|msg| vec![msg.clone()])
    }

    #[tokio::test]
    async fn test_implicit_stage_observed_with_provenance() {
        init_tracing();
        let flow = Flow::new("main");
        let observed = Arc::new(CollectingForwarder::new());
        flow.add_dispatcher(
            DispatcherConfig::new("success").with_scope(["func-id"]),
            observed.clone(),
        );
        let func = flow
            .add_stage(
                StageIdentity::new("func-id", "func", "function"),
                passthrough(),
                Arc::new(NoOpForwarder),
            )
            .unwrap();

        func.receive(Message::with_id("xyz").with_payload("foo").with_topic("bar"))
            .await;

        let forwarded = observed.messages_on(0);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].id().as_str(), "xyz");
        assert_eq!(forwarded[0].payload(), Some(&serde_json::json!("foo")));
        assert_eq!(forwarded[0].topic(), Some(&serde_json::json!("bar")));
        assert_eq!(
            forwarded[0].get("source"),
            Some(&serde_json::json!({
                "id": "func-id",
                "name": "func",
                "type": "function",
            }))
        );
    }

    #[tokio::test]
    async fn test_two_stages_one_dispatcher_attributed_independently() {
        init_tracing();
        let flow = Flow::new("main");
        let observed = Arc::new(CollectingForwarder::new());
        flow.add_dispatcher(
            DispatcherConfig::new("success").with_scope(["func1-id", "func2-id"]),
            observed.clone(),
        );
        let func1 = flow
            .add_stage(
                StageIdentity::new("func1-id", "func1", "function"),
                passthrough(),
                Arc::new(NoOpForwarder),
            )
            .unwrap();
        let func2 = flow
            .add_stage(
                StageIdentity::new("func2-id", "func2", "function"),
                passthrough(),
                Arc::new(NoOpForwarder),
            )
            .unwrap();

        func1.receive(Message::with_id("m1").with_payload("one")).await;
        func2.receive(Message::with_id("m2").with_payload("two")).await;

        let forwarded = observed.messages_on(0);
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[0].id().as_str(), "m1");
        assert_eq!(forwarded[0].payload(), Some(&serde_json::json!("one")));
        assert_eq!(
            forwarded[0].get("source").unwrap()["name"],
            serde_json::json!("func1")
        );
        assert_eq!(forwarded[1].id().as_str(), "m2");
        assert_eq!(
            forwarded[1].get("source").unwrap()["name"],
            serde_json::json!("func2")
        );
    }

    #[tokio::test]
    async fn test_same_identifier_twice_is_not_deduplicated() {
        init_tracing();
        let flow = Flow::new("main");
        let observed = Arc::new(CollectingForwarder::new());
        flow.add_dispatcher(
            DispatcherConfig::new("success").with_scope(["func-id"]),
            observed.clone(),
        );
        let func = flow
            .add_stage(
                StageIdentity::new("func-id", "func", "function"),
                passthrough(),
                Arc::new(NoOpForwarder),
            )
            .unwrap();

        func.receive(Message::with_id("shared")).await;
        func.receive(Message::with_id("shared")).await;

        assert_eq!(observed.len(), 2);
    }

    #[tokio::test]
    async fn test_explicit_stage_without_emission_still_observed() {
        init_tracing();
        let flow = Flow::new("main");
        let observed = Arc::new(CollectingForwarder::new());
        flow.add_dispatcher(
            DispatcherConfig::new("success").with_scope(["quiet-id"]),
            observed.clone(),
        );
        let quiet = flow
            .add_stage(
                StageIdentity::new("quiet-id", "quiet", "delay"),
                StageHandler::explicit_fn(|_msg, _emitter, done| async move {
                    tokio::task::yield_now().await;
                    done.done();
                }),
                Arc::new(NoOpForwarder),
            )
            .unwrap();

        quiet.receive(Message::with_id("m1").with_payload("foo")).await;

        let forwarded = observed.messages_on(0);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].payload(), Some(&serde_json::json!("foo")));
        assert_eq!(
            forwarded[0].get("source").unwrap()["type"],
            serde_json::json!("delay")
        );
    }

    #[tokio::test]
    async fn test_explicit_stage_wired_output_and_observer_both_see_one() {
        init_tracing();
        let flow = Flow::new("main");
        let wired = Arc::new(CollectingForwarder::new());
        let observed = Arc::new(CollectingForwarder::new());
        flow.add_dispatcher(
            DispatcherConfig::new("success").with_scope(["emit-id"]),
            observed.clone(),
        );
        let emit = flow
            .add_stage(
                StageIdentity::new("emit-id", "emit", "function"),
                StageHandler::explicit_fn(|msg, emitter, done| async move {
                    emitter.send(msg);
                    done.done();
                }),
                wired.clone() as Arc<dyn Forwarder>,
            )
            .unwrap();

        emit.receive(Message::with_id("m1").with_payload("foo")).await;

        assert_eq!(wired.len(), 1);
        assert_eq!(observed.len(), 1);
        // Downstream delivery carries no provenance annotation.
        assert!(wired.messages_on(0)[0].get("source").is_none());
        assert!(observed.messages_on(0)[0].get("source").is_some());
    }

    #[tokio::test]
    async fn test_deferred_done_after_receive_returns() {
        init_tracing();
        let flow = Flow::new("main");
        let observed = Arc::new(CollectingForwarder::new());
        flow.add_dispatcher(
            DispatcherConfig::new("success").with_scope(["slow-id"]),
            observed.clone(),
        );
        let slow = flow
            .add_stage(
                StageIdentity::new("slow-id", "slow", "delay"),
                StageHandler::explicit_fn(|_msg, _emitter, done| async move {
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        done.done();
                    });
                }),
                Arc::new(NoOpForwarder),
            )
            .unwrap();

        slow.receive(Message::with_id("m1")).await;

        // Control came back to the loop with the unit still open.
        assert_eq!(flow.registry().len(), 1);
        assert!(observed.is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(flow.registry().is_empty());
        assert_eq!(observed.len(), 1);
    }

    #[tokio::test]
    async fn test_error_and_success_dispatchers_split_outcomes() {
        init_tracing();
        let flow = Flow::new("main");
        let successes = Arc::new(CollectingForwarder::new());
        let errors = Arc::new(CollectingForwarder::new());
        flow.add_dispatcher(
            DispatcherConfig::new("success").with_scope(["flaky-id"]),
            successes.clone(),
        );
        flow.add_dispatcher(
            DispatcherConfig::new("catch")
                .with_scope(["flaky-id"])
                .with_mode(DispatchMode::Error),
            errors.clone(),
        );
        let flaky = flow
            .add_stage(
                StageIdentity::new("flaky-id", "flaky", "function"),
                StageHandler::explicit_fn(|msg, _emitter, done| async move {
                    if msg.topic() == Some(&serde_json::json!("bad")) {
                        done.error("unhandled input");
                    } else {
                        done.done();
                    }
                }),
                Arc::new(NoOpForwarder),
            )
            .unwrap();

        flaky.receive(Message::with_id("m1").with_topic("good")).await;
        flaky.receive(Message::with_id("m2").with_topic("bad")).await;

        assert_eq!(successes.len(), 1);
        assert_eq!(successes.messages_on(0)[0].id().as_str(), "m1");

        let caught = errors.messages_on(0);
        assert_eq!(caught.len(), 1);
        assert_eq!(caught[0].id().as_str(), "m2");
        assert_eq!(
            caught[0].get("error"),
            Some(&serde_json::json!({ "message": "unhandled input" }))
        );
    }

    #[tokio::test]
    async fn test_forked_units_coalesce_into_one_event() {
        init_tracing();
        let flow = Flow::new("main");
        let observed = Arc::new(CollectingForwarder::new());
        flow.add_dispatcher(
            DispatcherConfig::new("success").with_scope(["fan-id"]),
            observed.clone(),
        );
        let fan = flow
            .add_stage(
                StageIdentity::new("fan-id", "fan", "function"),
                StageHandler::explicit_fn(|_msg, _emitter, done| async move {
                    let extra = done.fork();
                    done.done();
                    // First end only drops the counter to one; the cycle
                    // closes when the forked unit ends.
                    extra.done();
                }),
                Arc::new(NoOpForwarder),
            )
            .unwrap();

        fan.receive(Message::with_id("m1")).await;

        assert_eq!(observed.len(), 1);
        assert!(flow.registry().is_empty());
    }

    #[tokio::test]
    async fn test_unconsumed_handle_leaks_visibly() {
        init_tracing();
        let flow = Flow::new("main");
        let observed = Arc::new(CollectingForwarder::new());
        flow.add_dispatcher(
            DispatcherConfig::new("success").with_scope(["stuck-id"]),
            observed.clone(),
        );
        let stuck = flow
            .add_stage(
                StageIdentity::new("stuck-id", "stuck", "function"),
                StageHandler::explicit_fn(|_msg, _emitter, done| async move {
                    drop(done);
                }),
                Arc::new(NoOpForwarder),
            )
            .unwrap();

        stuck.receive(Message::with_id("m1")).await;

        assert_eq!(flow.registry().len(), 1);
        assert!(observed.is_empty());
    }
}
