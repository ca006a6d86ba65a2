use super::{NativeAssets, NativeComponent, OpCode, decode_expression};
use itertools::Itertools;
use std::fmt;

/// Human-readable listing of a project's binary assets, for debugging.
pub struct Disassembly<'a>(pub &'a NativeAssets);

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let assets = self.0;
        writeln!(f, "======== CONSTANTS ========")?;
        for (i, constant) in assets.constants.iter().enumerate() {
            writeln!(f, "{:04}: {}", i, constant)?;
        }
        if !assets.global_variables.is_empty() {
            writeln!(f, "\n======== GLOBALS ========")?;
            for (i, name) in assets.global_variables.iter().enumerate() {
                writeln!(f, "{:04}: {}", i, name)?;
            }
        }

        for (index, flow) in assets.flows.iter().enumerate() {
            writeln!(f, "\n======== FLOW #{} {} ========", index, flow.name)?;
            if !flow.local_variables.is_empty() {
                writeln!(f, "locals: {}", flow.local_variables.iter().join(", "))?;
            }
            writeln!(
                f,
                "inputs: [{}] outputs: [{}]",
                flow.input_components.iter().join(", "),
                flow.output_components.iter().join(", ")
            )?;
            for (i, component) in flow.components.iter().enumerate() {
                write_component(f, i, component)?;
            }
        }
        Ok(())
    }
}

fn write_component(
    f: &mut fmt::Formatter<'_>,
    index: usize,
    component: &NativeComponent,
) -> fmt::Result {
    writeln!(
        f,
        "\n--- [{}] {} (type {}) ---",
        index, component.id, component.type_id
    )?;
    for (output, wires) in component.outputs.iter().enumerate() {
        if wires.is_empty() {
            continue;
        }
        let targets = wires
            .iter()
            .map(|w| format!("{}.{}", w.component, w.input))
            .join(", ");
        writeln!(f, "  out {} -> {}", output, targets)?;
    }
    for (property, bytes) in component.properties.iter().enumerate() {
        writeln!(f, "  property {}:", property)?;
        match decode_expression(bytes) {
            Ok(ops) => {
                for (offset, op) in ops {
                    writeln!(f, "    {:04}: {}", offset, Instruction(op))?;
                }
            }
            Err(error) => writeln!(f, "    <corrupt: {}>", error)?,
        }
    }
    if !component.specific.is_empty() {
        let hex = component
            .specific
            .iter()
            .map(|b| format!("{:02x}", b))
            .join(" ");
        writeln!(f, "  specific: {}", hex)?;
    }
    Ok(())
}

struct Instruction(OpCode);

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            op if op.jump_target().is_some() => {
                let name = format!("{:?}", op);
                let name = name.split('(').next().unwrap_or_default();
                write!(f, "{:<20} -> {:04}", name, op.jump_target().unwrap_or_default())
            }
            OpCode::Unary(op) => write!(f, "Unary {:?}", op),
            OpCode::Binary(op) => write!(f, "Binary {}", op.symbol()),
            op => write!(f, "{:?}", op),
        }
    }
}
