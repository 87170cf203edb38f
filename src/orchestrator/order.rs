use crate::package::DueInstallTask;

/// Order in which a batch is configured: dependencies before dependents.
///
/// Only edges inside the batch count. Among tasks whose in-batch
/// dependencies are all configured, the one supplied last goes first, so a
/// resolver-ordered batch (dependents first) is configured in reverse.
pub(crate) fn configure_order(tasks: &[DueInstallTask]) -> Vec<usize> {
    let edges: Vec<Vec<usize>> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            (0..tasks.len())
                .filter(|&j| {
                    j != i
                        && task
                            .meta()
                            .dependencies
                            .iter()
                            .any(|dep| dep.is_satisfied_by(tasks[j].meta()))
                })
                .collect()
        })
        .collect();

    let mut done = vec![false; tasks.len()];
    let mut order = Vec::with_capacity(tasks.len());

    while order.len() < tasks.len() {
        let ready = (0..tasks.len())
            .rev()
            .find(|&i| !done[i] && edges[i].iter().all(|&j| done[j]));
        // A cycle inside the batch cannot be ordered; fall back to reverse order.
        let next = ready.or_else(|| (0..tasks.len()).rev().find(|&i| !done[i]));
        let Some(next) = next else {
            break;
        };
        done[next] = true;
        order.push(next);
    }

    order
}
