use dbt_runner_core::Operation;

pub fn run() -> String {
    let width = Operation::ALL.iter().map(|operation| operation.as_str().len()).max().unwrap_or(0);

    Operation::ALL
        .iter()
        .map(|operation| format!("{:<width$}  {}", operation.as_str(), operation.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn lists_every_operation_in_order() {
        let output = run();
        let names: Vec<&str> =
            output.lines().filter_map(|line| line.split_whitespace().next()).collect();

        assert_eq!(
            names,
            vec![
                "run", "test", "list", "compile", "deps", "snapshot", "seed", "clean", "debug",
                "docs"
            ]
        );
    }
}
