use crate::support::fail;
use hyperhook_expr::{Expression, MatchMode, UNSET_ID, compile_expression};
use serde_json::json;

pub fn run(values: Vec<String>, link: bool, against: Option<String>, json_output: bool) {
    let (mode, mode_name) = if link {
        (MatchMode::Link, "link")
    } else {
        (MatchMode::Multilink, "multilink")
    };
    let expression = Expression::new(values.as_slice(), mode);
    let candidate: Option<Vec<String>> = against.map(|ids| {
        ids.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    });
    let matches = candidate.as_ref().map(|ids| match mode {
        MatchMode::Link => expression.matches_link(ids.first().map(String::as_str)),
        MatchMode::Multilink => expression.matches_multilink(ids),
    });

    if json_output {
        let payload = json!({
            "values": values,
            "mode": mode_name,
            "compiled": expression.is_compiled(),
            "expression": expression.compiled().map(ToString::to_string),
            "opcodes": expression.compiled().map(|node| node.to_opcodes()),
            "reason": fallback_reason(&values),
            "matches": matches,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).unwrap_or_else(|e| fail(e))
        );
        return;
    }

    match expression.compiled() {
        Some(node) => {
            println!("expression: {node}");
            println!("opcodes: {:?}", node.to_opcodes());
        }
        None => {
            println!("plain id list ({UNSET_ID} = unset)");
            if let Some(reason) = fallback_reason(&values) {
                println!("  not an opcode program: {reason}");
            }
        }
    }
    if let (Some(ids), Some(matches)) = (&candidate, matches) {
        println!("[{}] matches: {matches}", ids.join(","));
    }
}

/// Why the values did not compile, when they look like an opcode program.
fn fallback_reason(values: &[String]) -> Option<String> {
    let opcodes: Vec<i64> = values
        .iter()
        .map(|value| value.trim().parse())
        .collect::<Result<_, _>>()
        .ok()?;
    compile_expression(&opcodes).err().map(|e| e.to_string())
}
