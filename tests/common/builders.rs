//! Builders for simulated address spaces

use opc_recorder::backend::{SimulatedServer, ValuePattern, OBJECTS_NODE_ID};
use opc_recorder::types::RawValue;

use super::TEMP_ID;

/// Builder for small simulated plants
///
/// Parents are referenced by node id; the `Objects` folder is
/// [`OBJECTS_NODE_ID`].
pub struct PlantBuilder {
    server: SimulatedServer,
}

impl Default for PlantBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlantBuilder {
    pub fn new() -> Self {
        Self {
            server: SimulatedServer::new(),
        }
    }

    pub fn folder(self, parent: &str, node_id: &str, name: &str) -> Self {
        self.server
            .add_folder(parent, node_id, name)
            .unwrap_or_else(|e| panic!("folder {}: {}", node_id, e));
        self
    }

    pub fn variable(self, parent: &str, node_id: &str, name: &str, pattern: ValuePattern) -> Self {
        self.server
            .add_variable(parent, node_id, name, pattern)
            .unwrap_or_else(|e| panic!("variable {}: {}", node_id, e));
        self
    }

    pub fn constant(self, parent: &str, node_id: &str, name: &str, value: RawValue) -> Self {
        self.variable(parent, node_id, name, ValuePattern::Constant(value))
    }

    /// A chain of `depth` nested folders under `parent`, each holding one variable
    pub fn chain(mut self, parent: &str, prefix: &str, depth: usize) -> Self {
        let mut parent = parent.to_string();
        for level in 0..depth {
            let folder = format!("ns=3;s={}.F{}", prefix, level);
            self = self
                .folder(&parent, &folder, &format!("F{}", level))
                .constant(
                    &folder,
                    &format!("{}.V", folder),
                    "V",
                    RawValue::Int(level as i64),
                );
            parent = folder;
        }
        self
    }

    pub fn build(self) -> SimulatedServer {
        self.server
    }
}

/// `Objects/PLC` with `Temp` cycling 21.5, 21.6, 21.4 and a constant `Pressure`
pub fn oven_plant() -> SimulatedServer {
    PlantBuilder::new()
        .folder(OBJECTS_NODE_ID, "ns=2;s=PLC", "PLC")
        .variable(
            "ns=2;s=PLC",
            TEMP_ID,
            "Temp",
            ValuePattern::Cycle(vec![21.5.into(), 21.6.into(), 21.4.into()]),
        )
        .constant("ns=2;s=PLC", "ns=2;i=6", "Pressure", 1.013.into())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_builder() {
        let server = PlantBuilder::new().chain(OBJECTS_NODE_ID, "Deep", 3).build();
        // Root, Objects, three folders and three variables
        assert_eq!(server.node_count(), 8);
    }
}
