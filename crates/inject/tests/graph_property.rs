//! Property tests over random acyclic provider graphs.
//!
//! - every provider is invoked exactly once per session
//! - every dependent is torn down before its dependencies
//! - the registry's resolution order puts dependencies first

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use keel_inject::{Arguments, Config, Manager, Provided};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategy: node i may only depend on nodes j < i, so the graph is a DAG
// ---------------------------------------------------------------------------

fn arb_dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|size| {
        (0..size)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i.min(4)))
            .collect::<Vec<_>>()
    })
}

fn node(i: usize) -> String {
    format!("p{i}")
}

struct Observed {
    invocations: HashMap<String, usize>,
    teardowns: Vec<String>,
}

fn run(dag: &[Vec<usize>], config: Config) -> Observed {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let invocations = Arc::new(Mutex::new(HashMap::<String, usize>::new()));
        let teardowns = Arc::new(Mutex::new(Vec::<String>::new()));
        let manager = Manager::with_config(config);

        for (i, deps) in dag.iter().enumerate() {
            let name = node(i);
            let invocations = Arc::clone(&invocations);
            let teardowns = Arc::clone(&teardowns);
            let owned = name.clone();
            manager
                .provide(name, deps.iter().map(|&d| node(d)), move |_args: Arguments| {
                    *invocations.lock().unwrap().entry(owned.clone()).or_default() += 1;
                    let teardowns = Arc::clone(&teardowns);
                    let owned = owned.clone();
                    async move {
                        Ok(Provided::scoped((), move |_value: Arc<()>| async move {
                            teardowns.lock().unwrap().push(owned);
                            Ok(())
                        }))
                    }
                })
                .unwrap();
        }
        manager.freeze();
        let session = manager.enter_session().unwrap();

        // request in reverse so most nodes are first reached transitively
        session
            .resolve((0..dag.len()).rev().map(node))
            .await
            .unwrap();
        manager.exit_session().await.unwrap();

        let invocations = invocations.lock().unwrap().clone();
        let teardowns = teardowns.lock().unwrap().clone();
        Observed {
            invocations,
            teardowns,
        }
    })
}

fn check(dag: &[Vec<usize>], observed: &Observed) -> Result<(), TestCaseError> {
    prop_assert_eq!(observed.invocations.len(), dag.len());
    prop_assert!(observed.invocations.values().all(|&n| n == 1));
    prop_assert_eq!(observed.teardowns.len(), dag.len());

    let position: HashMap<&str, usize> = observed
        .teardowns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    for (i, deps) in dag.iter().enumerate() {
        for &d in deps {
            prop_assert!(
                position[node(i).as_str()] < position[node(d).as_str()],
                "{} must be torn down before its dependency {}",
                node(i),
                node(d)
            );
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn concurrent_resolution_respects_dependencies(dag in arb_dag()) {
        let observed = run(&dag, Config::default());
        check(&dag, &observed)?;
    }

    #[test]
    fn sequential_resolution_respects_dependencies(dag in arb_dag()) {
        let observed = run(&dag, Config::default().sequential());
        check(&dag, &observed)?;
    }

    #[test]
    fn resolution_order_puts_dependencies_first(dag in arb_dag()) {
        let manager = Manager::new();
        for (i, deps) in dag.iter().enumerate() {
            manager
                .provide(node(i), deps.iter().map(|&d| node(d)), |_args: Arguments| async {
                    Ok(Provided::value(()))
                })
                .unwrap();
        }

        let order = manager.registry().resolution_order().unwrap();
        prop_assert_eq!(order.len(), dag.len());
        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        for (i, deps) in dag.iter().enumerate() {
            for &d in deps {
                prop_assert!(position[node(d).as_str()] < position[node(i).as_str()]);
            }
        }
    }
}
