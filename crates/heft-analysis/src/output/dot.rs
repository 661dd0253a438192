//! DOT (Graphviz) export of the weighted reference graph.

use std::io::{self, Write};

use heft_core::{ObjectId, Program};

/// Escape special characters for DOT format strings.
///
/// DOT format requires escaping:
/// - `\` → `\\` (backslash)
/// - `"` → `\"` (double quote)
/// - `<` → `\<` (less than, for HTML-like labels)
/// - `>` → `\>` (greater than, for HTML-like labels)
pub fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

/// Tunables for the weight graph.
///
/// The defaults are the heuristics the reports were calibrated with; none
/// of them has a principled derivation, which is exactly why they are
/// configuration rather than constants.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Only follow edges into symbols whose subtree carries more than this
    /// much weight.
    pub weight_threshold: u64,
    /// Node font size is `size * font_scale / total_size`.
    pub font_scale: f64,
    /// Floor for the node font size.
    pub min_font_size: f64,
    /// Edge pen width is `(weight * 100 / max_weight) ^ penwidth_exponent`.
    pub penwidth_exponent: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            weight_threshold: 30_000,
            font_scale: 80_000.0,
            min_font_size: 9.0,
            penwidth_exponent: 0.6,
        }
    }
}

/// Exports the DFS-reachable subgraph of heavy symbols as a `digraph`.
///
/// Nodes are labeled with pretty name, size, and transitive weight; font
/// and pen sizes scale with the symbol's share of the binary so the heavy
/// paths stand out when rendered. Expects weights to be propagated (see
/// [`analyze_weights`](crate::analyze_weights)).
pub struct WeightDotExporter {
    config: GraphConfig,
}

impl Default for WeightDotExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightDotExporter {
    /// Creates an exporter with the default configuration.
    pub fn new() -> Self {
        Self {
            config: GraphConfig::default(),
        }
    }

    /// Creates an exporter with a custom configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Self { config }
    }

    /// Writes the graph document. A program without an entry point
    /// produces an empty graph.
    pub fn export<W: Write>(&self, program: &Program, mut writer: W) -> io::Result<()> {
        writeln!(writer, "digraph weights {{")?;
        if let Some(entry) = program.entry_point() {
            self.export_from(program, entry, &mut writer)?;
        }
        writeln!(writer, "}}")
    }

    fn export_from<W: Write>(
        &self,
        program: &Program,
        entry: ObjectId,
        writer: &mut W,
    ) -> io::Result<()> {
        let total_size = program.total_size();
        let max_weight = program.object(entry).max_weight.max(1);

        struct Frame {
            id: ObjectId,
            children: Vec<ObjectId>,
            next: usize,
        }

        let frame = |id: ObjectId| Frame {
            id,
            children: program.object(id).refs.iter().copied().collect(),
            next: 0,
        };

        let mut seen = std::collections::HashSet::new();
        seen.insert(entry);
        self.write_node(program, entry, total_size, writer)?;
        let mut stack = vec![frame(entry)];

        loop {
            let Some(top) = stack.last_mut() else { break };
            if top.next >= top.children.len() {
                stack.pop();
                continue;
            }
            let from = top.id;
            let to = top.children[top.next];
            top.next += 1;

            if program.object(to).max_weight <= self.config.weight_threshold {
                continue;
            }

            let penwidth = (program.object(to).weight as f64 * 100.0 / max_weight as f64)
                .powf(self.config.penwidth_exponent);
            writeln!(
                writer,
                "  \"{}\" -> \"{}\" [penwidth={}];",
                escape_dot_string(&program.object(from).name),
                escape_dot_string(&program.object(to).name),
                penwidth
            )?;

            if seen.insert(to) {
                self.write_node(program, to, total_size, writer)?;
                stack.push(frame(to));
            }
        }

        Ok(())
    }

    fn write_node<W: Write>(
        &self,
        program: &Program,
        id: ObjectId,
        total_size: u64,
        writer: &mut W,
    ) -> io::Result<()> {
        let object = program.object(id);
        let fontsize = if total_size == 0 {
            self.config.min_font_size
        } else {
            (object.size as f64 * self.config.font_scale / total_size as f64)
                .max(self.config.min_font_size)
        };
        writeln!(
            writer,
            "  \"{}\" [label=\"{}\\nsize: {}\\nweight: {}\", fontsize={}];",
            escape_dot_string(&object.name),
            escape_dot_string(&object.pretty_name),
            object.size,
            object.weight,
            fontsize
        )
    }

    /// Writes the graph into a string.
    pub fn export_to_string(&self, program: &Program) -> String {
        let mut buf = Vec::new();
        self.export(program, &mut buf)
            .expect("writing to Vec should not fail");
        String::from_utf8(buf).expect("DOT output should be valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heft_core::Program;
    use heft_demangle::BestEffortDemangler;

    use crate::analyze_weights;

    fn program() -> Program {
        Program::new(Box::new(BestEffortDemangler::new()))
    }

    #[test]
    fn test_escape_dot_string() {
        assert_eq!(escape_dot_string("plain"), "plain");
        assert_eq!(escape_dot_string("a\\b"), "a\\\\b");
        assert_eq!(escape_dot_string("a\"b"), "a\\\"b");
        assert_eq!(escape_dot_string("f<int>"), "f\\<int\\>");
    }

    #[test]
    fn test_empty_program_emits_empty_graph() {
        let p = program();
        let dot = WeightDotExporter::new().export_to_string(&p);
        assert_eq!(dot, "digraph weights {\n}\n");
    }

    #[test]
    fn test_heavy_path_is_emitted_light_path_pruned() {
        let mut p = program();
        let entry = p.add_object("entry", 0x100, 100, false);
        let heavy = p.add_object("heavy", 0x200, 50_000, false);
        let light = p.add_object("light", 0x300, 10, false);
        p.add_ref(entry, heavy);
        p.add_ref(entry, light);
        p.set_entry_point(entry);
        analyze_weights(&mut p).unwrap();

        let dot = WeightDotExporter::new().export_to_string(&p);

        assert!(dot.starts_with("digraph weights {"));
        assert!(dot.contains("\"entry\" -> \"heavy\""));
        assert!(dot.contains("\"heavy\" [label=\"heavy\\nsize: 50000\\nweight: 50000\""));
        assert!(!dot.contains("-> \"light\""));
        assert!(!dot.contains("\"light\" [label"));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let mut p = program();
        let entry = p.add_object("entry", 0x100, 10, false);
        let small = p.add_object("small", 0x200, 100, false);
        p.add_ref(entry, small);
        p.set_entry_point(entry);
        analyze_weights(&mut p).unwrap();

        let config = GraphConfig {
            weight_threshold: 50,
            ..Default::default()
        };
        let dot = WeightDotExporter::with_config(config).export_to_string(&p);
        assert!(dot.contains("\"entry\" -> \"small\""));
    }

    #[test]
    fn test_font_size_has_a_floor() {
        let mut p = program();
        let entry = p.add_object("entry", 0x100, 1, false);
        p.add_object("bulk", 0x200, 1_000_000, false);
        p.set_entry_point(entry);
        analyze_weights(&mut p).unwrap();

        let dot = WeightDotExporter::new().export_to_string(&p);
        // entry is 1 byte of a ~1MB binary; its label uses the floor size.
        assert!(dot.contains("fontsize=9"));
    }

    #[test]
    fn test_cycle_does_not_loop() {
        let mut p = program();
        let a = p.add_object("A", 0x100, 40_000, false);
        let b = p.add_object("B", 0x200, 40_000, false);
        p.add_ref(a, b);
        p.add_ref(b, a);
        p.set_entry_point(a);
        analyze_weights(&mut p).unwrap();

        let dot = WeightDotExporter::new().export_to_string(&p);
        assert!(dot.contains("\"A\" -> \"B\""));
        assert!(dot.contains("\"B\" -> \"A\""));
        assert!(dot.ends_with("}\n"));
    }
}
