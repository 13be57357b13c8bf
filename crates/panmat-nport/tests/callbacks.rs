//! Integration tests for N-port setup followed by evaluation.

use std::sync::Arc;

use panmat_core::{Host, HostArray, HostValue, Scope, StructValue, Workspace};
use panmat_nport::{EvalRequest, NportBridge, SetupRequest, evaluate};

/// A linear conductance between two ports: f = G * v.
fn register_conductance(ws: &Workspace) {
    ws.register_function("gmat", |_, args, nargout| {
        if nargout == 1 {
            return Ok(vec![
                StructValue::new()
                    .with_field("g11", 1.0)
                    .with_field("g12", -0.5)
                    .with_field("g21", -0.5)
                    .with_field("g22", 2.0)
                    .into(),
            ]);
        }
        let params = args[0].as_struct().unwrap();
        let g = |name: &str| {
            params
                .get(name)
                .and_then(HostValue::as_array)
                .and_then(HostArray::scalar_value)
                .unwrap()
        };
        let v = args[2].as_array().unwrap().real_part().to_vec();
        let f = vec![
            g("g11") * v[0] + g("g12") * v[1],
            g("g21") * v[0] + g("g22") * v[1],
        ];
        // column-major [g11 g12; g21 g22]
        let c = HostArray::matrix(2, 2, vec![g("g11"), g("g21"), g("g12"), g("g22")])?;
        Ok(vec![HostArray::column(f).into(), c.into(), HostArray::zeros(2, 2).into()])
    });
}

#[test]
fn test_setup_then_evaluate() {
    let ws = Workspace::new();
    register_conductance(&ws);
    let bridge = NportBridge::new();

    let params = bridge
        .set_up(
            &ws,
            &SetupRequest {
                function: "gmat".to_string(),
                model: "cond".to_string(),
                export: true,
            },
        )
        .unwrap();
    assert_eq!(params.get("g12"), Some(-0.5));

    let exported = ws.get_variable(Scope::Caller, "cond").unwrap();
    assert_eq!(exported.as_struct().map(StructValue::len), Some(4));

    let response = evaluate(
        &ws,
        &params,
        &EvalRequest {
            function: "gmat".to_string(),
            port_count: 2,
            voltages: vec![1.0, 2.0],
            currents: vec![0.0, 0.0],
            time: 0.0,
            state_count: 1,
        },
    )
    .unwrap();

    assert_eq!(response.rhs, vec![0.0, 3.5]);
    assert_eq!(response.c[(0, 1)], -0.5);
    assert_eq!(response.c[(1, 1)], 2.0);
    assert!(response.r.to_column_major().iter().all(|&x| x == 0.0));
}

#[test]
fn test_exported_set_survives_function_change() {
    let ws = Workspace::new();
    register_conductance(&ws);
    let bridge = NportBridge::new();
    let request = SetupRequest {
        function: "gmat".to_string(),
        model: "cond".to_string(),
        export: true,
    };

    let first = bridge.set_up(&ws, &request).unwrap();
    ws.register_function("gmat", |_, _, _| Ok(vec![HostValue::from("not a struct")]));
    let second = bridge.set_up(&ws, &request).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    bridge.clear();
    assert!(bridge.set_up(&ws, &request).is_err());
}
