//! A TOML target manifest: a deliberately small stand-in for a real rule
//! file (out of scope here) that is just expressive enough to drive the
//! resolver end to end for the demo CLI.
//!
//! ```toml
//! [[target]]
//! name = "deploy"
//! prereqs = ["build"]
//! factvar_prereqs = ["release_flag"]
//!
//! [[target.actions]]
//! method = "log"
//! args = ["deploying"]
//! ```

use dres_resolver::{Action, ResolverEngine, ResolverError, VarFlags};
use dres_store::FactStore;
use dres_vm::Chunk;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ManifestValue {
    Int(i32),
    Double(f64),
    String(String),
}

#[derive(Debug, Deserialize)]
pub struct ManifestAction {
    pub method: String,
    #[serde(default)]
    pub args: Vec<ManifestValue>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestTarget {
    pub name: String,
    #[serde(default)]
    pub prereqs: Vec<String>,
    #[serde(default)]
    pub factvar_prereqs: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ManifestAction>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub target: Vec<ManifestTarget>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("could not parse manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

impl Manifest {
    pub fn parse(contents: &str) -> Result<Manifest, ManifestError> {
        Ok(toml::from_str(contents)?)
    }
}

/// Compile one manifest action into a chunk that pushes the method name,
/// pushes each literal argument in order, then calls it — the minimal
/// bytecode shape `CALL` requires (§4.1): name beneath its arguments.
fn compile_action(action: &ManifestAction) -> Action {
    let mut chunk = Chunk::new();
    chunk.push_string(&action.method);
    for arg in &action.args {
        match arg {
            ManifestValue::Int(i) => chunk.push_int(*i),
            ManifestValue::Double(d) => chunk.push_double(*d),
            ManifestValue::String(s) => chunk.push_string(s),
        };
    }
    chunk.call(action.args.len() as u32);
    chunk.halt();
    Action::new(action.method.clone(), chunk)
}

/// Load every target in `manifest` into `engine`. Target names forward-
/// reference freely (§6.2's two-phase registration): this does a first pass
/// interning every declared name before any target's prerequisite list is
/// resolved, so manifest ordering doesn't matter.
pub fn install<S: FactStore>(
    engine: &mut ResolverEngine<S>,
    manifest: &Manifest,
) -> Result<(), ManifestError> {
    for target in &manifest.target {
        engine.target_id(&target.name);
    }

    for target in &manifest.target {
        let mut prereqs = Vec::with_capacity(target.prereqs.len() + target.factvar_prereqs.len());
        for name in &target.prereqs {
            prereqs.push(engine.target_id(name));
        }
        for name in &target.factvar_prereqs {
            prereqs.push(engine.register_factvar(name, VarFlags::PREREQ));
        }
        let actions = target.actions.iter().map(compile_action).collect();
        engine.register_target(&target.name, prereqs, actions)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_manifest() {
        let toml = r#"
            [[target]]
            name = "build"

            [[target]]
            name = "deploy"
            prereqs = ["build"]
            factvar_prereqs = ["release_flag"]

            [[target.actions]]
            method = "log"
            args = ["deploying"]
        "#;
        let manifest = Manifest::parse(toml).unwrap();
        assert_eq!(manifest.target.len(), 2);
        assert_eq!(manifest.target[1].prereqs, vec!["build".to_string()]);
        assert_eq!(manifest.target[1].actions[0].method, "log");
    }

    #[test]
    fn forward_referenced_prereqs_install_in_any_declaration_order() {
        let toml = r#"
            [[target]]
            name = "deploy"
            prereqs = ["build"]

            [[target]]
            name = "build"
        "#;
        let manifest = Manifest::parse(toml).unwrap();
        let mut engine = dres_resolver::ResolverEngine::new(dres_store::MemoryStore::new());
        install(&mut engine, &manifest).unwrap();
        assert!(engine.tables().target_lookup("build").is_some());
        assert!(engine.tables().target_lookup("deploy").is_some());
    }
}
