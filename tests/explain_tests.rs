use sqlens::{is_explain, parse_plan, parse_plan_report, PlanError};

#[test]
fn detector_basic_cases() {
    assert!(is_explain("EXPLAIN SELECT 1"));
    assert!(is_explain("explain analyze select 1"));
    assert!(!is_explain("SELECT 1"));
    assert!(!is_explain(""));
}

#[test]
fn detector_and_parser_agree() {
    // Statements the SQL parser accepts as EXPLAIN are also detected.
    for sql in ["EXPLAIN SELECT 1", "EXPLAIN (ANALYZE) SELECT * FROM t", "explain verbose select 1"] {
        assert!(is_explain(sql), "not detected: {sql}");
        assert!(sqlens::parse(sql).is_ok(), "not parsed: {sql}");
    }
}

#[test]
fn full_analyze_report() {
    let text = "\
                                      QUERY PLAN
--------------------------------------------------------------------------------
Sort  (cost=112.50..113.00 rows=200 width=40) (actual time=1.200..1.250 rows=180 loops=1)
  Sort Key: dept
  ->  Hash Join  (cost=35.00..104.00 rows=200 width=40) (actual time=0.400..1.000 rows=180 loops=1)
        Hash Cond: (e.dept_id = d.id)
        ->  Seq Scan on emp e  (cost=0.00..55.00 rows=2000 width=24) (actual time=0.010..0.300 rows=2000 loops=1)
        ->  Hash  (cost=25.00..25.00 rows=800 width=20) (actual time=0.350..0.350 rows=800 loops=1)
              ->  Seq Scan on dept d  (cost=0.00..25.00 rows=800 width=20) (actual time=0.005..0.200 rows=800 loops=1)
Planning Time: 0.250 ms
Execution Time: 1.400 ms
";
    let report = parse_plan_report(text).unwrap();
    assert_eq!(report.roots.len(), 1);
    let sort = &report.roots[0];
    assert_eq!(sort.operation, "Sort");
    assert_eq!(sort.extra, vec!["Sort Key: dept".to_string()]);
    assert_eq!(sort.children.len(), 1);

    let join = &sort.children[0];
    assert_eq!(join.operation, "Hash Join");
    assert_eq!(join.children.len(), 2);
    assert_eq!(join.extra, vec!["Hash Cond: (e.dept_id = d.id)".to_string()]);
    assert_eq!(join.children[0].target.as_deref(), Some("emp e"));
    assert_eq!(join.children[1].operation, "Hash");
    assert_eq!(join.children[1].children[0].target.as_deref(), Some("dept d"));

    assert_eq!(report.planning_time, Some(0.25));
    assert_eq!(report.execution_time, Some(1.4));
    assert_eq!(report.total_time, Some(1.25));
}

#[test]
fn bad_report_line_is_an_error() {
    let err = parse_plan("garbage that is not a plan").unwrap_err();
    let PlanError::Format { line_number, raw_line } = err;
    assert_eq!(line_number, 1);
    assert_eq!(raw_line, "garbage that is not a plan");
}

#[test]
fn plan_nodes_marshal_to_json() {
    let nodes = parse_plan("Seq Scan on users  (cost=0.00..35.50 rows=100 width=36)").unwrap();
    let json = serde_json::to_value(&nodes).unwrap();
    assert_eq!(json[0]["operation"], "Seq Scan");
    assert_eq!(json[0]["target"], "users");
    assert_eq!(json[0]["plan_rows"], 100);
    assert_eq!(json[0]["children"], serde_json::json!([]));
}
