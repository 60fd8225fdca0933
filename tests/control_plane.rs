use std::sync::{Arc, Barrier};
use std::thread;

use serde_json::json;
use uuid::Uuid;

use triggerplane::models::{
    ActionFilter, ActionRequest, ComponentFilter, ComponentRequest, EventSourceFilter, EventSourceRequest,
    EventSourceUpdate, PageRequest, TriggerActionSpec, TriggerExecutionFilter, TriggerFilter, TriggerRequest,
    TriggerUpdate, WorkspaceRequest, WorkspaceUpdate,
};
use triggerplane::rbac::{Action as Verb, Grant};
use triggerplane::{
    document, ActionInvocation, AllowAll, Caller, ControlPlane, Document, Event, EventSourceId, ExecutionError,
    FlavorRegistry, PermissionSet, PlaneConfig, PlaneError, PluginSubType, PluginType, ResourceType, Stores,
    ValidationError, WorkspaceId,
};

fn admin() -> Caller {
    Caller::admin("root")
}

fn plane() -> ControlPlane {
    ControlPlane::in_memory(Arc::new(AllowAll)).unwrap()
}

fn workspace(plane: &ControlPlane, name: &str) -> WorkspaceId {
    plane
        .create_workspace(&admin(), WorkspaceRequest::new(name))
        .unwrap()
        .id
}

fn webhook_request(ws: WorkspaceId, name: &str) -> EventSourceRequest {
    EventSourceRequest {
        workspace_id: ws,
        name: name.to_string(),
        flavor: "webhook".to_string(),
        plugin_subtype: PluginSubType::Webhook,
        configuration: Document::new(),
        description: String::new(),
    }
}

fn schedule_request(ws: WorkspaceId, name: &str, config: serde_json::Value) -> EventSourceRequest {
    EventSourceRequest {
        workspace_id: ws,
        name: name.to_string(),
        flavor: "schedule".to_string(),
        plugin_subtype: PluginSubType::Schedule,
        configuration: document(config),
        description: String::new(),
    }
}

fn trigger_request(ws: WorkspaceId, source: EventSourceId, name: &str) -> TriggerRequest {
    TriggerRequest {
        workspace_id: ws,
        name: name.to_string(),
        description: "nightly".to_string(),
        event_source_id: source,
        event_filter: Document::new(),
        action: TriggerActionSpec::Inline {
            flavor: "builtin".to_string(),
            subtype: "pipeline_run".to_string(),
            configuration: document(json!({"template_id": Uuid::new_v4().to_string()})),
        },
    }
}

#[test]
fn workspace_lifecycle() {
    let plane = plane();
    let ws = workspace(&plane, "default");

    let renamed = plane
        .update_workspace(
            &admin(),
            ws,
            WorkspaceUpdate {
                name: Some("main".to_string()),
                description: None,
            },
        )
        .unwrap();
    assert_eq!(renamed.name, "main");

    let dehydrated = plane.get_workspace(&admin(), ws, false).unwrap();
    assert!(dehydrated.metadata.is_none());

    plane.delete_workspace(&admin(), ws).unwrap();
    assert!(plane.get_workspace(&admin(), ws, false).unwrap_err().is_not_found());
}

#[test]
fn schedule_source_configuration_is_validated() {
    let plane = plane();
    let ws = workspace(&plane, "default");

    let err = plane
        .create_event_source(&admin(), schedule_request(ws, "empty", json!({})))
        .unwrap_err();
    assert!(err.is_configuration());

    let err = plane
        .create_event_source(&admin(), schedule_request(ws, "typo", json!({"interval_seconds": "10"})))
        .unwrap_err();
    assert!(err.is_configuration());

    let created = plane
        .create_event_source(&admin(), schedule_request(ws, "hourly", json!({"cron_expression": "0 * * * *"})))
        .unwrap();
    assert!(created.body.is_active);
    assert_eq!(created.body.plugin_subtype, PluginSubType::Schedule);
}

#[test]
fn unknown_flavor_is_rejected() {
    let plane = plane();
    let ws = workspace(&plane, "default");
    let mut request = webhook_request(ws, "kafka");
    request.flavor = "kafka".to_string();
    let err = plane.create_event_source(&admin(), request).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.http_status(), 422);
}

#[test]
fn names_are_unique_within_a_workspace() {
    let plane = plane();
    let ws_a = workspace(&plane, "a");
    let ws_b = workspace(&plane, "b");
    plane.create_event_source(&admin(), webhook_request(ws_a, "github")).unwrap();
    plane.create_event_source(&admin(), webhook_request(ws_b, "github")).unwrap();

    let err = plane
        .create_event_source(&admin(), webhook_request(ws_a, "github"))
        .unwrap_err();
    assert!(matches!(
        err,
        PlaneError::Validation(ValidationError::DuplicateName { .. })
    ));
    assert_eq!(err.http_status(), 409);

    let err = plane
        .create_workspace(&admin(), WorkspaceRequest::new(""))
        .unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[test]
fn concurrent_creates_with_one_name_admit_one() {
    let plane = plane();
    let ws = workspace(&plane, "default");
    let barrier = Barrier::new(8);

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    plane.create_event_source(&admin(), webhook_request(ws, "github"))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(
            err,
            PlaneError::Validation(ValidationError::DuplicateName { .. })
        ));
    }
    let page = plane
        .list_event_sources(&admin(), &EventSourceFilter::default(), plane.default_page(), false)
        .unwrap();
    assert_eq!(page.total, 1);
}

#[test]
fn concurrent_trigger_updates_keep_both_changes() {
    let plane = plane();
    let ws = workspace(&plane, "default");
    let source = plane
        .create_event_source(&admin(), webhook_request(ws, "github"))
        .unwrap()
        .id;

    for round in 0..32 {
        let trigger = plane
            .create_trigger(&admin(), trigger_request(ws, source, &format!("t{round}")))
            .unwrap()
            .id;
        let description = format!("round {round}");
        let barrier = Barrier::new(2);
        thread::scope(|scope| {
            scope.spawn(|| {
                barrier.wait();
                plane
                    .update_trigger(
                        &admin(),
                        trigger,
                        TriggerUpdate {
                            is_active: Some(false),
                            ..TriggerUpdate::default()
                        },
                    )
                    .unwrap();
            });
            scope.spawn(|| {
                barrier.wait();
                plane
                    .update_trigger(
                        &admin(),
                        trigger,
                        TriggerUpdate {
                            description: Some(description.clone()),
                            ..TriggerUpdate::default()
                        },
                    )
                    .unwrap();
            });
        });

        let stored = plane.get_trigger(&admin(), trigger, true).unwrap();
        assert!(!stored.body.is_active, "round {round}: deactivation lost");
        assert_eq!(stored.metadata.unwrap().description, description);
        assert!(!plane.registry().is_live(source, trigger), "round {round}: registry still live");
    }
}

#[test]
fn concurrent_source_toggles_leave_registry_in_step() {
    let plane = plane();
    let ws = workspace(&plane, "default");
    let source = plane
        .create_event_source(&admin(), webhook_request(ws, "github"))
        .unwrap()
        .id;
    let trigger = plane
        .create_trigger(&admin(), trigger_request(ws, source, "t1"))
        .unwrap()
        .id;

    for round in 0..32 {
        let barrier = Barrier::new(2);
        thread::scope(|scope| {
            for is_active in [false, true] {
                let barrier = &barrier;
                let plane = &plane;
                scope.spawn(move || {
                    barrier.wait();
                    plane
                        .update_event_source(
                            &admin(),
                            source,
                            EventSourceUpdate {
                                is_active: Some(is_active),
                                description: Some(format!("set {is_active}")),
                                ..EventSourceUpdate::default()
                            },
                        )
                        .unwrap();
                });
            }
        });

        let stored = plane.get_event_source(&admin(), source, true).unwrap();
        assert_eq!(
            plane.registry().is_live(source, trigger),
            stored.body.is_active,
            "round {round}: registry diverged from store"
        );
        assert_eq!(
            stored.metadata.unwrap().description,
            format!("set {}", stored.body.is_active)
        );
    }
}

#[test]
fn event_source_update_revalidates_configuration() {
    let plane = plane();
    let ws = workspace(&plane, "default");
    let source = plane
        .create_event_source(&admin(), schedule_request(ws, "hourly", json!({"interval_seconds": 3600})))
        .unwrap()
        .id;

    let err = plane
        .update_event_source(
            &admin(),
            source,
            EventSourceUpdate {
                configuration: Some(document(json!({"cron_expression": "every hour"}))),
                ..EventSourceUpdate::default()
            },
        )
        .unwrap_err();
    assert!(err.is_configuration());

    let updated = plane
        .update_event_source(
            &admin(),
            source,
            EventSourceUpdate {
                configuration: Some(document(json!({"cron_expression": "0 * * * *"}))),
                ..EventSourceUpdate::default()
            },
        )
        .unwrap();
    let config = updated.metadata.unwrap().configuration;
    assert!(config.get("interval_seconds").is_none());
}

#[test]
fn trigger_cannot_reference_another_workspace() {
    let plane = plane();
    let ws_a = workspace(&plane, "a");
    let ws_b = workspace(&plane, "b");
    let source_b = plane
        .create_event_source(&admin(), webhook_request(ws_b, "github"))
        .unwrap()
        .id;

    let err = plane
        .create_trigger(&admin(), trigger_request(ws_a, source_b, "cross"))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn inline_action_is_validated() {
    let plane = plane();
    let ws = workspace(&plane, "default");
    let source = plane
        .create_event_source(&admin(), webhook_request(ws, "github"))
        .unwrap()
        .id;
    let mut request = trigger_request(ws, source, "bad-action");
    request.action = TriggerActionSpec::Inline {
        flavor: "builtin".to_string(),
        subtype: "webhook".to_string(),
        configuration: Document::new(),
    };
    assert!(plane.create_trigger(&admin(), request).unwrap_err().is_configuration());
}

#[test]
fn trigger_listing_paginates() {
    let plane = plane();
    let ws = workspace(&plane, "default");
    let source = plane
        .create_event_source(&admin(), webhook_request(ws, "github"))
        .unwrap()
        .id;
    for i in 0..5 {
        plane
            .create_trigger(&admin(), trigger_request(ws, source, &format!("t{i}")))
            .unwrap();
    }

    let filter = TriggerFilter {
        workspace_id: Some(ws),
        ..TriggerFilter::default()
    };
    let first = plane
        .list_triggers(&admin(), &filter, PageRequest::new(1, 2), false)
        .unwrap();
    assert_eq!(first.total, 5);
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.items.len(), 2);
    assert!(first.items.iter().all(|t| t.metadata.is_none()));

    let last = plane
        .list_triggers(&admin(), &filter, PageRequest::new(3, 2), true)
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].body.event_source_flavor, "webhook");
    assert_eq!(last.items[0].metadata.as_ref().unwrap().description, "nightly");

    let err = plane
        .list_triggers(&admin(), &filter, PageRequest::new(4, 2), false)
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn page_size_is_clamped_to_configured_maximum() {
    let mut config = PlaneConfig::default();
    config.pagination.max_page_size = 3;
    let plane = ControlPlane::new(config, FlavorRegistry::builtin(), Stores::in_memory(), Arc::new(AllowAll)).unwrap();
    let ws = workspace(&plane, "default");
    for i in 0..4 {
        plane
            .create_event_source(&admin(), webhook_request(ws, &format!("hook-{i}")))
            .unwrap();
    }
    let page = plane
        .list_event_sources(&admin(), &EventSourceFilter::default(), PageRequest::new(1, 100), false)
        .unwrap();
    assert_eq!(page.max_size, 3);
    assert_eq!(page.items.len(), 3);
}

#[test]
fn caller_without_grant_is_forbidden() {
    let setup = plane();
    let ws = workspace(&setup, "default");
    let source = setup
        .create_event_source(&admin(), webhook_request(ws, "github"))
        .unwrap()
        .id;

    let grants = PermissionSet::new().grant(
        "viewer",
        Grant {
            action: Verb::Read,
            resource_type: ResourceType::EventSource,
            workspace_id: Some(ws),
        },
    );
    let plane = ControlPlane::new(
        PlaneConfig::default(),
        FlavorRegistry::builtin(),
        setup.stores().clone(),
        Arc::new(grants),
    )
    .unwrap();
    let viewer = Caller::user("viewer");

    assert!(plane.get_event_source(&viewer, source, true).is_ok());
    let err = plane.delete_event_source(&viewer, source).unwrap_err();
    assert!(err.is_forbidden());
    assert_eq!(err.http_status(), 403);
    assert!(plane
        .create_trigger(&viewer, trigger_request(ws, source, "t1"))
        .unwrap_err()
        .is_forbidden());
    assert!(plane
        .create_trigger(&admin(), trigger_request(ws, source, "t1"))
        .is_ok());
}

#[test]
fn deleting_a_workspace_removes_everything_in_it() {
    let plane = plane();
    let ws = workspace(&plane, "doomed");
    let keep = workspace(&plane, "kept");

    let source = plane
        .create_event_source(&admin(), webhook_request(ws, "github"))
        .unwrap()
        .id;
    let trigger = plane
        .create_trigger(&admin(), trigger_request(ws, source, "t1"))
        .unwrap()
        .id;
    plane
        .create_action(
            &admin(),
            ActionRequest {
                workspace_id: ws,
                name: "deploy".to_string(),
                flavor: "builtin".to_string(),
                plugin_subtype: PluginSubType::PipelineRun,
                configuration: document(json!({"template_id": Uuid::new_v4().to_string()})),
                description: String::new(),
            },
        )
        .unwrap();
    plane
        .register_component(
            &admin(),
            ComponentRequest {
                workspace_id: Some(ws),
                name: "builder".to_string(),
                component_type: PluginType::ImageBuilder,
                flavor: "aws".to_string(),
                configuration: document(json!({"code_build_project": "images"})),
            },
        )
        .unwrap();
    plane
        .create_event_source(&admin(), webhook_request(keep, "github"))
        .unwrap();

    let dispatcher = plane.dispatcher(Arc::new(|_: &ActionInvocation| Ok::<(), ExecutionError>(())));
    dispatcher.dispatch(&Event::new(source, Document::new())).unwrap();

    let stats = plane.workspace_statistics(&admin(), ws).unwrap();
    assert_eq!((stats.event_sources, stats.actions, stats.triggers, stats.components), (1, 1, 1, 1));

    plane.delete_workspace(&admin(), ws).unwrap();

    let page = PageRequest::default();
    assert_eq!(
        plane
            .list_event_sources(&admin(), &EventSourceFilter::default(), page, false)
            .unwrap()
            .total,
        1
    );
    assert_eq!(plane.list_actions(&admin(), &ActionFilter::default(), page, false).unwrap().total, 0);
    assert_eq!(
        plane
            .list_components(&admin(), &ComponentFilter::default(), page, false)
            .unwrap()
            .total,
        0
    );
    assert_eq!(
        plane
            .list_trigger_executions(&admin(), &TriggerExecutionFilter::for_trigger(trigger), page, false)
            .unwrap()
            .total,
        0
    );
    assert!(plane.registry().triggers_for(source).is_err());
}

#[test]
fn shared_components_have_no_workspace() {
    let plane = plane();
    let component = plane
        .register_component(
            &admin(),
            ComponentRequest {
                workspace_id: None,
                name: "builder".to_string(),
                component_type: PluginType::ImageBuilder,
                flavor: "aws".to_string(),
                configuration: document(json!({"code_build_project": "images"})),
            },
        )
        .unwrap();
    let fetched = plane.get_component(&admin(), component.id, true).unwrap();
    let metadata = fetched.metadata.unwrap();
    assert!(metadata.workspace_id.is_none());
    assert_eq!(metadata.configuration["implicit_container_registry_auth"], json!(true));

    plane.delete_component(&admin(), component.id).unwrap();
    assert!(plane.get_component(&admin(), component.id, false).unwrap_err().is_not_found());
}
