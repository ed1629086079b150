//! Type-safe arguments for the copy-on-write volume snapshot tool.
//!
//! The tool is reached through a configurable command prefix because on
//! docker hosts it usually lives inside the volume plugin's runtime
//! (`sudo runc --root <plugin root> exec -t <id> buttervolume`).

use crate::command_args::CommandArgs;

/// Volume tool subcommands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeOp {
    /// List all snapshots, one id per line.
    List,
    /// Snapshot a volume; prints the new snapshot id.
    Snapshot { volume: String },
    /// Replace the volume with the snapshot's content.
    Restore { snapshot: String },
    /// Delete a snapshot.
    Remove { snapshot: String },
}

#[derive(Debug, Clone)]
pub struct VolumeToolArgs {
    /// Command prefix, first element is the program.
    pub tool: Vec<String>,
    pub op: VolumeOp,
}

impl CommandArgs for VolumeToolArgs {
    fn program(&self) -> String {
        self.tool.first().cloned().unwrap_or_else(|| "buttervolume".into())
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.tool.iter().skip(1).cloned().collect();
        match &self.op {
            VolumeOp::List => args.push("snapshots".into()),
            VolumeOp::Snapshot { volume } => {
                args.push("snapshot".into());
                args.push(volume.clone());
            }
            VolumeOp::Restore { snapshot } => {
                args.push("restore".into());
                args.push(snapshot.clone());
            }
            VolumeOp::Remove { snapshot } => {
                args.push("rm".into());
                args.push(snapshot.clone());
            }
        }
        args
    }
}
