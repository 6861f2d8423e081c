//! TOML import/export of the branch topology: one `[branches.<name>]` table per type, in
//! declaration order.

use flow_kernel::topology::{BranchTypeConfig, Topology};
use flow_kernel::{FlowError, FlowResult};
use toml::{Table, Value};

const BRANCHES: &str = "branches";
const REMOTE: &str = "remote";

#[derive(Clone, Debug)]
pub struct TopologyDocument {
    pub topology: Topology,
    pub remote: Option<String>,
}

pub fn export_toml(topology: &Topology, remote: Option<&str>) -> FlowResult<String> {
    let mut branches = Table::new();
    for entry in topology.entries() {
        let value = Value::try_from(entry).map_err(|err| {
            FlowError::Configuration(format!("cannot serialize `{}`: {err}", entry.name))
        })?;
        let Value::Table(mut table) = value else {
            continue;
        };
        table.remove("name");
        branches.insert(entry.name.clone(), Value::Table(table));
    }

    let mut document = Table::new();
    if let Some(remote) = remote {
        document.insert(REMOTE.to_string(), Value::String(remote.to_string()));
    }
    document.insert(BRANCHES.to_string(), Value::Table(branches));
    toml::to_string(&document)
        .map_err(|err| FlowError::Configuration(format!("cannot render topology: {err}")))
}

pub fn import_toml(raw: &str) -> FlowResult<TopologyDocument> {
    let document: Table = toml::from_str(raw)
        .map_err(|err| FlowError::Configuration(format!("invalid topology file: {err}")))?;

    let remote = match document.get(REMOTE) {
        None => None,
        Some(Value::String(remote)) => Some(remote.trim().to_string()).filter(|r| !r.is_empty()),
        Some(_) => {
            return Err(FlowError::Configuration(
                "`remote` must be a string".to_string(),
            ));
        }
    };

    let Some(Value::Table(branches)) = document.get(BRANCHES) else {
        return Err(FlowError::Configuration(
            "topology file needs a [branches] table".to_string(),
        ));
    };

    let mut entries = Vec::new();
    for (name, value) in branches {
        let Value::Table(table) = value else {
            return Err(FlowError::Configuration(format!(
                "`branches.{name}` must be a table"
            )));
        };
        let mut table = table.clone();
        table.insert("name".to_string(), Value::String(name.clone()));
        let entry: BranchTypeConfig = Value::Table(table).try_into().map_err(|err| {
            FlowError::Configuration(format!("invalid `branches.{name}`: {err}"))
        })?;
        entries.push(entry);
    }

    Ok(TopologyDocument {
        topology: Topology::new(entries)?,
        remote,
    })
}
