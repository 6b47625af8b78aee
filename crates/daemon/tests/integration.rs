//! Integration tests for the tilework engine protocol and layout flow.
//!
//! These tests run without a UI host or a real backend. They test:
//! - Command and response wire format
//! - Layout computation feeding a backend batch
//! - Tiling persistence through a workspace record

use tilework_backend::{Backend, MemoryBackend};
use tilework_core_layout::{
    LayoutMode, LayoutOutcome, Point, Rect, TilingState, WorkspaceTiling,
};
use tilework_ipc::{
    decode_line, encode_line, AppLayoutInfo, BackendRequest, IpcCommand, IpcResponse,
    WorkspaceRecord,
};

// ============================================================================
// Wire format
// ============================================================================

#[test]
fn test_all_commands_roundtrip() {
    let commands = vec![
        IpcCommand::SetLayoutMode {
            mode: "split-vertical".to_string(),
        },
        IpcCommand::AssignApp {
            tile: 2,
            app_id: "notion".to_string(),
        },
        IpcCommand::FocusTile { tile: 1 },
        IpcCommand::ContainerResized {
            x: 50.0,
            y: 50.0,
            width: 1200.0,
            height: 800.0,
        },
        IpcCommand::DividerPointerDown,
        IpcCommand::DividerPointerMove { x: 410.5, y: 12.0 },
        IpcCommand::DividerPointerUp,
        IpcCommand::DividerDoubleClick,
        IpcCommand::SetSplitRatio { ratio: 0.3 },
        IpcCommand::SwitchWorkspace {
            workspace_id: "work".to_string(),
        },
        IpcCommand::QueryTiling,
        IpcCommand::Apply,
        IpcCommand::Reload,
        IpcCommand::Stop,
    ];

    for cmd in commands {
        let json = serde_json::to_string(&cmd).expect("serialize");
        let parsed: IpcCommand = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, cmd, "Command roundtrip failed: {}", json);
    }
}

#[test]
fn test_command_wire_shape() {
    let json = serde_json::to_string(&IpcCommand::AssignApp {
        tile: 0,
        app_id: "slack".to_string(),
    })
    .unwrap();
    assert_eq!(json, r#"{"type":"assign_app","tile":0,"app_id":"slack"}"#);

    let cmd: IpcCommand =
        serde_json::from_str(r#"{"type":"set_layout_mode","mode":"two-thirds-left"}"#).unwrap();
    assert_eq!(
        cmd,
        IpcCommand::SetLayoutMode {
            mode: "two-thirds-left".to_string()
        }
    );
}

#[test]
fn test_tiling_state_response_roundtrip() {
    let response = IpcResponse::TilingState {
        workspace_id: Some("default".to_string()),
        mode: "grid".to_string(),
        split_ratio: 0.5,
        active_tile: Some(3),
        tiles: vec!["a".to_string(), String::new(), String::new(), "d".to_string()],
        dragging: false,
        placements: vec![AppLayoutInfo {
            app_id: "a".to_string(),
            x: 0.0,
            y: 0.0,
            width: 800.0,
            height: 450.0,
        }],
    };
    let line = encode_line(&response).unwrap();
    let parsed: IpcResponse = decode_line(&line).unwrap();
    assert_eq!(parsed, response);
}

#[test]
fn test_protocol_newline_delimited() {
    let line = encode_line(&IpcCommand::QueryTiling).unwrap();
    assert!(line.ends_with('\n'));
    assert_eq!(line.matches('\n').count(), 1);

    let line = encode_line(&IpcResponse::warning("Window too narrow\nfor tiling")).unwrap();
    // Embedded newlines are escaped by JSON.
    assert_eq!(line.matches('\n').count(), 1);
}

#[test]
fn test_warning_response_format() {
    let json = serde_json::to_string(&IpcResponse::warning("Window too narrow for tiling layout"))
        .unwrap();
    assert_eq!(
        json,
        r#"{"status":"warning","message":"Window too narrow for tiling layout"}"#
    );
}

#[test]
fn test_invalid_json_parsing() {
    assert!(serde_json::from_str::<IpcCommand>("").is_err());
    assert!(serde_json::from_str::<IpcCommand>("{").is_err());
    assert!(serde_json::from_str::<IpcCommand>(r#"{"type":"assign_app","tile":0}"#).is_err());
}

#[test]
fn test_unknown_command_type() {
    let result = serde_json::from_str::<IpcCommand>(r#"{"type":"focus_left"}"#);
    assert!(result.is_err());
}

#[test]
fn test_workspace_record_without_name() {
    let record: WorkspaceRecord = serde_json::from_str(
        r#"{"id":"w1","tiling_layout":"three-column","tile_assignments":["a","","c"]}"#,
    )
    .unwrap();
    assert_eq!(record.name, "");
    assert_eq!(record.tile_assignments, vec!["a", "", "c"]);
}

// ============================================================================
// Layout flow
// ============================================================================

fn to_batch(outcome: LayoutOutcome) -> Vec<AppLayoutInfo> {
    match outcome {
        LayoutOutcome::Placements(placements) => placements
            .into_iter()
            .map(|p| AppLayoutInfo {
                app_id: p.app_id,
                x: p.rect.x,
                y: p.rect.y,
                width: p.rect.width,
                height: p.rect.height,
            })
            .collect(),
        other => panic!("expected placements, got {:?}", other),
    }
}

#[tokio::test]
async fn test_split_vertical_batch_reaches_backend() {
    let backend = MemoryBackend::new();
    let mut state = TilingState::default();
    state.set_container(Rect::new(50.0, 50.0, 1200.0, 800.0));
    state.set_mode(LayoutMode::SplitVertical);
    state.set_split_ratio(0.3);
    state.assign_app(0, "slack").unwrap();
    state.assign_app(1, "gmail").unwrap();

    backend.apply_layout(to_batch(state.compute_layout())).await.unwrap();

    let batches = backend.applied_layouts();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch[0].app_id, "slack");
    assert_eq!((batch[0].x, batch[0].y), (50.0, 50.0));
    assert!((batch[0].width - 360.0).abs() < 1e-9);
    assert_eq!(batch[0].height, 800.0);
    assert_eq!(batch[1].app_id, "gmail");
    assert!((batch[1].x - 410.0).abs() < 1e-9);
    assert!((batch[1].width - 840.0).abs() < 1e-9);
}

#[test]
fn test_drag_then_layout_uses_new_ratio() {
    let mut state = TilingState::default();
    state.set_container(Rect::new(0.0, 100.0, 1000.0, 600.0));
    state.set_mode(LayoutMode::SplitHorizontal);
    state.assign_app(0, "top").unwrap();
    state.assign_app(1, "bottom").unwrap();

    assert!(state.begin_drag());
    state.drag_to(Point::new(0.0, 250.0));
    assert!(state.end_drag());

    let batch = to_batch(state.compute_layout());
    assert!((batch[0].height - 150.0).abs() < 1e-9);
    assert!((batch[1].y - 250.0).abs() < 1e-9);
    assert!((batch[1].height - 450.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_tiling_survives_persist_and_restore() {
    let backend = MemoryBackend::with_workspaces(
        vec![WorkspaceRecord {
            id: "work".to_string(),
            name: "Work".to_string(),
            tiling_layout: String::new(),
            tile_assignments: Vec::new(),
        }],
        "work",
    );

    let mut state = TilingState::default();
    state.set_mode(LayoutMode::ThreeColumn);
    state.assign_app(0, "jira").unwrap();
    state.assign_app(2, "slack").unwrap();
    let snapshot = state.snapshot();
    backend
        .update_workspace_tiling("work", snapshot.mode.as_str(), snapshot.tiles)
        .await
        .unwrap();

    assert!(backend
        .calls()
        .contains(&BackendRequest::UpdateWorkspaceTiling {
            workspace_id: "work".to_string(),
            tiling_layout: "three-column".to_string(),
            tile_assignments: vec!["jira".to_string(), String::new(), "slack".to_string()],
        }));

    let record = backend.get_active_workspace().await.unwrap().unwrap();
    let mut restored = TilingState::default();
    restored.restore(&WorkspaceTiling::from_record(
        &record.tiling_layout,
        &record.tile_assignments,
    ));
    assert_eq!(restored.mode(), LayoutMode::ThreeColumn);
    assert_eq!(restored.assignments(), state.assignments());
}

#[test]
fn test_narrow_container_falls_back_before_placing() {
    let mut state = TilingState::default();
    state.set_container(Rect::new(0.0, 0.0, 550.0, 800.0));
    state.set_mode(LayoutMode::ThreeColumn);
    state.assign_app(1, "gmail").unwrap();

    assert!(matches!(
        state.compute_layout(),
        LayoutOutcome::TooNarrow {
            previous: LayoutMode::ThreeColumn,
            ..
        }
    ));
    assert_eq!(state.mode(), LayoutMode::Single);
    assert!(state.assignments().is_empty());

    // Two-tile layouts only need 500px.
    state.set_mode(LayoutMode::TwoThirdsLeft);
    state.assign_app(0, "gmail").unwrap();
    assert!(matches!(state.compute_layout(), LayoutOutcome::Placements(_)));
}
