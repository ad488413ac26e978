//! End-to-end dispatch scenarios over small topologies

mod common;

use std::sync::Arc;

use common::{Failing, Origin, Rejector, Relay, Terminal};
use trellis::{
    ConfigError, DispatchError, FaultCatalog, Message, NodeRegistry, Pipeline, Record, Router,
    RouterConfig, RoutingMap, Transaction,
};

fn setup() -> (Arc<NodeRegistry>, Arc<FaultCatalog>) {
    (
        Arc::new(NodeRegistry::new()),
        Arc::new(FaultCatalog::new()),
    )
}

#[test]
fn fanout_delivers_fresh_envelopes_to_both_destinations() {
    let (registry, catalog) = setup();
    let reader = registry.register(Origin::new("reader"));
    let filter = Relay::new("filter");
    let logger = Terminal::new("logger");
    let filter_handle = registry.register(filter.clone());
    let logger_handle = registry.register(logger.clone());

    let mut map = RoutingMap::new(registry, catalog);
    map.set_process_destinations(reader, vec![filter_handle, logger_handle]);

    let router = Router::new(Arc::new(map), RouterConfig::default()).unwrap();
    let payload = vec![Record::from("row-1"), Record::from("row-2")];
    let original = Message::new(payload.clone(), reader);
    let original_id = original.id();
    router.dispatch(original).unwrap();

    for seen in [&filter.seen()[0], &logger.seen()[0]] {
        assert_eq!(seen.sender(), reader);
        assert_eq!(seen.payload(), payload.as_slice());
        // A fresh envelope per hop, never the original instance.
        assert_ne!(seen.id(), original_id);
    }
}

#[test]
fn unrouted_discard_is_dropped_after_logging() {
    let (registry, catalog) = setup();
    let reader = registry.register(Origin::new("reader"));
    let filter = Rejector::new("filter");
    let logger = Terminal::new("logger");
    let filter_handle = registry.register(filter.clone());
    let logger_handle = registry.register(logger.clone());

    let mut map = RoutingMap::new(registry, catalog);
    map.set_process_destinations(reader, vec![filter_handle]);
    map.set_process_destinations(filter_handle, vec![logger_handle]);
    // No discard destinations for filter: the record goes nowhere.

    let config = RouterConfig {
        log_discard_as_info: true,
        metrics_enabled: true,
        ..Default::default()
    };
    let router = Router::new(Arc::new(map), config).unwrap();
    router
        .dispatch(Message::new(vec![Record::from("row-1")], reader))
        .unwrap();

    assert_eq!(filter.seen().len(), 1);
    assert!(logger.seen().is_empty());
    assert_eq!(router.metrics().records_discarded, 1);
}

#[test]
fn routable_fault_reaches_wildcard_handler() {
    let (registry, catalog) = setup();
    let runtime = catalog.register("runtime", catalog.root()).unwrap();
    let npe = catalog.register("runtime.null", runtime).unwrap();

    let reader = registry.register(Origin::new("reader"));
    let logger = registry.register(Failing::new("logger", npe));
    let handler = Terminal::new("handler");
    let handler_handle = registry.register(handler.clone());

    let mut map = RoutingMap::new(registry, catalog);
    map.set_process_destinations(reader, vec![logger]);
    // Parent kind registered as wildcard default catches the child kind.
    map.set_wildcard_fault_destinations("runtime", vec![handler_handle])
        .unwrap();

    let router = Router::new(Arc::new(map), RouterConfig::default()).unwrap();
    let transaction = Transaction::new(String::from("tx-1"));
    router
        .dispatch(
            Message::new(vec![Record::from("row-1")], reader)
                .with_transaction(transaction.clone()),
        )
        .unwrap();

    let delivered = handler.seen();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].sender(), logger);
    // Fault envelopes carry the transaction but no metadata.
    assert!(delivered[0]
        .transaction()
        .unwrap()
        .same_handle(&transaction));
    assert!(delivered[0].metadata().is_none());

    let payload = &delivered[0].payload()[0];
    assert_eq!(payload.as_value()["kind"], "runtime.null");
}

#[test]
fn unroutable_fault_aborts_dispatch() {
    let (registry, catalog) = setup();
    let io = catalog.register("io", catalog.root()).unwrap();
    let timeout = catalog.register("io.timeout", io).unwrap();
    catalog.register("runtime", catalog.root()).unwrap();

    let reader = registry.register(Origin::new("reader"));
    let logger = registry.register(Failing::new("logger", timeout));
    let handler = registry.register(Origin::new("handler"));

    let mut map = RoutingMap::new(registry, catalog);
    map.set_process_destinations(reader, vec![logger]);
    // Registered kind is unrelated to io.timeout, so nothing matches.
    map.set_wildcard_fault_destinations("runtime", vec![handler])
        .unwrap();

    let router = Router::new(Arc::new(map), RouterConfig::default()).unwrap();
    let err = router
        .dispatch(Message::new(vec![Record::from("row-1")], reader))
        .unwrap_err();

    match err {
        DispatchError::UnroutableFault { kind, node } => {
            assert_eq!(kind, "io.timeout");
            assert_eq!(node, "logger");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fatal_fault_abandons_remaining_siblings() {
    let (registry, catalog) = setup();
    let io = catalog.register("io", catalog.root()).unwrap();

    let reader = registry.register(Origin::new("reader"));
    let failing = registry.register(Failing::new("failing", io));
    let survivor = Relay::new("survivor");
    let survivor_handle = registry.register(survivor.clone());

    let mut map = RoutingMap::new(registry, catalog);
    map.set_process_destinations(reader, vec![failing, survivor_handle]);

    let router = Router::new(Arc::new(map), RouterConfig::default()).unwrap();
    let err = router
        .dispatch(Message::new(vec![Record::from("row-1")], reader))
        .unwrap_err();

    assert!(matches!(err, DispatchError::UnroutableFault { .. }));
    // The failing sibling came first; the survivor is never attempted.
    assert!(survivor.seen().is_empty());
}

#[test]
fn handler_fault_escalates_through_configured_chain() {
    let (registry, catalog) = setup();
    let io = catalog.register("io", catalog.root()).unwrap();

    let reader = registry.register(Origin::new("reader"));
    let failing = registry.register(Failing::new("failing", io));
    let primary = registry.register(Failing::new("primary", io));
    let secondary = Terminal::new("secondary");
    let secondary_handle = registry.register(secondary.clone());

    let mut map = RoutingMap::new(registry, catalog);
    map.set_process_destinations(reader, vec![failing]);
    // The primary handler has its own fault route: its failures escalate
    // to the secondary instead of aborting the dispatch.
    map.set_fault_destinations(failing, "io", vec![primary])
        .unwrap();
    map.set_fault_destinations(primary, "io", vec![secondary_handle])
        .unwrap();

    let router = Router::new(Arc::new(map), RouterConfig::default()).unwrap();
    router
        .dispatch(Message::new(vec![Record::from("row-1")], reader))
        .unwrap();

    let delivered = secondary.seen();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].sender(), primary);
}

#[test]
fn handler_fault_is_fatal_by_default() {
    let (registry, catalog) = setup();
    let io = catalog.register("io", catalog.root()).unwrap();

    let reader = registry.register(Origin::new("reader"));
    let failing = registry.register(Failing::new("failing", io));
    let handler = registry.register(Failing::new("handler", io));

    let mut map = RoutingMap::new(registry, catalog);
    map.set_process_destinations(reader, vec![failing]);
    map.set_wildcard_fault_destinations("io", vec![handler])
        .unwrap();

    let router = Router::new(Arc::new(map), RouterConfig::default()).unwrap();
    let err = router
        .dispatch(Message::new(vec![Record::from("row-1")], reader))
        .unwrap_err();
    assert!(matches!(err, DispatchError::HandlerFault { .. }));
}

#[test]
fn handler_fault_can_be_downgraded() {
    let (registry, catalog) = setup();
    let io = catalog.register("io", catalog.root()).unwrap();

    let reader = registry.register(Origin::new("reader"));
    let failing = registry.register(Failing::new("failing", io));
    let handler = registry.register(Failing::new("handler", io));
    let after = Relay::new("after");
    let after_handle = registry.register(after.clone());

    let mut map = RoutingMap::new(registry, catalog);
    map.set_process_destinations(reader, vec![failing, after_handle]);
    map.set_wildcard_fault_destinations("io", vec![handler])
        .unwrap();

    let config = RouterConfig {
        ignore_handler_faults: true,
        metrics_enabled: true,
        ..Default::default()
    };
    let router = Router::new(Arc::new(map), config).unwrap();
    router
        .dispatch(Message::new(vec![Record::from("row-1")], reader))
        .unwrap();

    // The handler's own failure is swallowed and the dispatch continues.
    assert_eq!(after.seen().len(), 1);
    assert_eq!(router.metrics().handler_faults_ignored, 1);
}

#[test]
fn pipeline_chains_and_catches_everything() {
    let (registry, catalog) = setup();
    let io = catalog.register("io", catalog.root()).unwrap();

    let source = registry.register(Origin::new("source"));
    let transform = Relay::new("transform");
    let sink = Terminal::new("sink");
    let handler = Terminal::new("handler");
    let transform_handle = registry.register(transform.clone());
    let sink_handle = registry.register(sink.clone());
    let handler_handle = registry.register(handler.clone());

    let map = Pipeline::new(vec![source, transform_handle, sink_handle])
        .with_fault_handler(handler_handle)
        .build(registry.clone(), catalog.clone())
        .unwrap();

    assert_eq!(map.process_destinations(source), &[transform_handle]);
    assert_eq!(map.process_destinations(transform_handle), &[sink_handle]);

    let router = Router::new(Arc::new(map), RouterConfig::default()).unwrap();
    router
        .dispatch(Message::new(vec![Record::from("row-1")], source))
        .unwrap();
    assert_eq!(sink.records(), vec![Record::from("row-1")]);

    let (registry2, catalog2) = (registry, catalog);
    let source2 = registry2.register(Origin::new("source2"));
    let failing = registry2.register(Failing::new("failing", io));
    let sink2 = registry2.register(Terminal::new("sink2"));

    // Interior node fails; the root-kind handler still catches it.
    let map2 = Pipeline::new(vec![source2, failing, sink2])
        .with_fault_handler(handler_handle)
        .build(registry2, catalog2)
        .unwrap();
    let router2 = Router::new(Arc::new(map2), RouterConfig::default()).unwrap();
    router2
        .dispatch(Message::new(vec![Record::from("row-2")], source2))
        .unwrap();
    assert_eq!(handler.seen().len(), 1);
}

#[test]
fn pipeline_rejects_non_source_head() {
    let (registry, catalog) = setup();
    let head = registry.register(Relay::new("head"));
    let sink = registry.register(Terminal::new("sink"));

    let err = Pipeline::new(vec![head, sink])
        .build(registry, catalog)
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::PipelineEndpoint {
            position: "first",
            ..
        }
    ));
}
