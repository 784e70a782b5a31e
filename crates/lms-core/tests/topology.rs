//! Port-level connections, diagnostics and connection graph

use lms_core::{
    export_graph, find_islands, graph_stats, Model, ModelError, PortKind, QuantityId, Sense,
    Severity, TimeSet, TimeSetId, UnitId, VarDomain,
};

/// Create a node with a flow `p` and an effort `v` exposed on port `terminal`
fn node(model: &mut Model, name: &str, time: TimeSetId, sense: Sense) -> (UnitId, QuantityId) {
    let mut unit = model.add_unit(name, "Node", time).unwrap();
    let p = unit.flow_var("p", VarDomain::real(), sense).unwrap();
    let v = unit.effort_var("v", VarDomain::real()).unwrap();
    unit.port("terminal", &[("p", p), ("v", v)]).unwrap();
    (unit.finish(), p)
}

fn model_with_time() -> (Model, TimeSetId) {
    let mut model = Model::new("grid");
    let time = model
        .add_time_set(TimeSet::discrete("time", vec![0.0, 1.0, 2.0]).unwrap())
        .unwrap();
    (model, time)
}

#[test]
fn connect_ports_routes_members_by_tag() {
    let (mut model, time) = model_with_time();
    let (source, _) = node(&mut model, "source", time, Sense::Out);
    let (sink, _) = node(&mut model, "sink", time, Sense::In);

    let names = model
        .connect_ports(&[(source, "terminal"), (sink, "terminal")])
        .expect("ports connect");
    assert_eq!(
        names,
        vec![
            "_flow_cst_source_p&sink_p".to_string(),
            "_effort_cst_source_v&sink_v".to_string()
        ]
    );
}

#[test]
fn connect_ports_requires_matching_members() {
    let (mut model, time) = model_with_time();
    let (source, _) = node(&mut model, "source", time, Sense::Out);
    let mut unit = model.add_unit("meter", "Meter", time).unwrap();
    let p = unit.flow_var("p", VarDomain::real(), Sense::In).unwrap();
    unit.port("terminal", &[("p", p)]).unwrap();
    let meter = unit.finish();

    let err = model
        .connect_ports(&[(source, "terminal"), (meter, "terminal")])
        .unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));
    assert!(model.constraints().is_empty());
}

#[test]
fn connect_ports_unknown_port() {
    let (mut model, time) = model_with_time();
    let (source, _) = node(&mut model, "source", time, Sense::Out);
    let (sink, _) = node(&mut model, "sink", time, Sense::In);
    let err = model
        .connect_ports(&[(source, "terminal"), (sink, "outlet")])
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::UnknownPort {
            unit: "sink".into(),
            port: "outlet".into()
        }
    );
}

#[test]
fn diagnostics_flag_unconnected_and_untagged_members() {
    let (mut model, time) = model_with_time();
    let (source, source_p) = node(&mut model, "source", time, Sense::Out);
    let (_sink, sink_p) = node(&mut model, "sink", time, Sense::In);
    model.set_port_type(source_p, PortKind::None).unwrap();

    let diag = model.diagnose();
    // source.p untagged, sink.p never connected
    assert_eq!(diag.warning_count(), 2);
    assert!(diag
        .issues
        .iter()
        .all(|i| i.severity == Severity::Warning && i.category == "ports"));

    model.set_port_type(source_p, PortKind::Flow).unwrap();
    model.connect_flow(&[source_p, sink_p]).unwrap();
    assert!(!model.diagnose().has_issues());
    assert_eq!(model.unit(source).unwrap().ports().len(), 1);
}

#[test]
fn diagnostics_flag_single_sense_balance() {
    let (mut model, time) = model_with_time();
    let (_, a) = node(&mut model, "a", time, Sense::Out);
    let (_, b) = node(&mut model, "b", time, Sense::Out);
    model.connect_flow(&[a, b]).unwrap();
    let diag = model.diagnose();
    assert_eq!(diag.issues_by_category("connections").count(), 1);
}

#[test]
fn islands_follow_connections() {
    let (mut model, time) = model_with_time();
    let (a, _) = node(&mut model, "a", time, Sense::Out);
    let (b, _) = node(&mut model, "b", time, Sense::In);
    let (c, _) = node(&mut model, "c", time, Sense::Out);
    let (d, _) = node(&mut model, "d", time, Sense::In);
    model
        .connect_ports(&[(a, "terminal"), (b, "terminal")])
        .unwrap();
    model
        .connect_ports(&[(c, "terminal"), (d, "terminal")])
        .unwrap();

    let analysis = find_islands(&model);
    assert_eq!(analysis.islands.len(), 2);
    assert_eq!(analysis.assignments[0].island_id, analysis.assignments[1].island_id);
    assert_ne!(analysis.assignments[0].island_id, analysis.assignments[2].island_id);

    let stats = graph_stats(&model);
    assert_eq!(stats.node_count, 4);
    assert_eq!(stats.edge_count, 4);
    assert_eq!(stats.connected_components, 2);
    assert_eq!(stats.max_degree, 1);
}

#[test]
fn dot_export_lists_units_and_connections() {
    let (mut model, time) = model_with_time();
    let (a, _) = node(&mut model, "a", time, Sense::Out);
    let (b, _) = node(&mut model, "b", time, Sense::In);
    model
        .connect_ports(&[(a, "terminal"), (b, "terminal")])
        .unwrap();
    let dot = export_graph(&model, "dot").unwrap();
    assert!(dot.starts_with("graph \"grid\" {"));
    assert!(dot.contains("n0 [label=\"a\"]"));
    assert!(dot.contains("n0 -- n1 [label=\"_flow_cst_a_p&b_p\"]"));
    assert!(export_graph(&model, "gexf").is_err());
}
