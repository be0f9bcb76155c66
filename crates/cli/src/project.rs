// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `odb.toml` project loader.
//!
//! The build-description script language and its evaluator are explicitly
//! out of scope for the core (spec §1): [`odb_engine::BuildDescription`] is
//! the seam an external collaborator fills in. This module is a minimal,
//! deliberately non-clever implementation of that seam — a flat TOML
//! project file listing precompiled headers, objects, libraries, modules,
//! programs, and module-copy steps — so `odb build` has something to
//! drive end to end without a real script evaluator. It is glue, not the
//! excluded language.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use odb_core::{CompilerSettings, ConfigError, Language, OptimizationLevel};
use odb_engine::{
    BuildDescription, BuildGraph, LibraryNode, ModuleCopyNode, ModuleNode, Node, NodeId,
    ObjectNode, PchNode, ProgramNode,
};
use serde::Deserialize;

pub const PROJECT_FILE_NAME: &str = "odb.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingsToml {
    pub debug_symbols: Option<bool>,
    pub optimization: Option<String>,
    pub warning_level: Option<u32>,
    pub warnings_as_errors: Option<bool>,
    pub enable_rtti: Option<bool>,
    pub enable_exceptions: Option<bool>,
    pub use_sse: Option<bool>,
    pub include_paths: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub forced_includes: Vec<PathBuf>,
    pub library_paths: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub modules: Vec<String>,
    pub language: Option<String>,
    pub object_cache_path: Option<PathBuf>,
    pub object_cache_workspace_root: Option<PathBuf>,
    pub link_objects_in_library: Option<bool>,
    pub function_level_linking: Option<bool>,
}

impl SettingsToml {
    fn apply_to(&self, mut settings: CompilerSettings) -> Result<CompilerSettings, ConfigError> {
        if let Some(v) = self.debug_symbols {
            settings.debug_symbols = v;
        }
        if let Some(v) = &self.optimization {
            settings.optimization = parse_optimization(v)?;
        }
        if let Some(v) = self.warning_level {
            settings.warning_level = Some(v);
        }
        if let Some(v) = self.warnings_as_errors {
            settings.warnings_as_errors = v;
        }
        if let Some(v) = self.enable_rtti {
            settings.enable_rtti = v;
        }
        if let Some(v) = self.enable_exceptions {
            settings.enable_exceptions = v;
        }
        if let Some(v) = self.use_sse {
            settings.use_sse = v;
        }
        settings.include_paths.extend(self.include_paths.iter().cloned());
        settings.defines.extend(self.defines.iter().cloned());
        settings.forced_includes.extend(self.forced_includes.iter().cloned());
        settings.library_paths.extend(self.library_paths.iter().cloned());
        settings.libraries.extend(self.libraries.iter().cloned());
        settings.modules.extend(self.modules.iter().cloned());
        if let Some(v) = &self.language {
            settings.language = Some(parse_language(v)?);
        }
        if let Some(v) = &self.object_cache_path {
            settings.object_cache_path = Some(v.clone());
        }
        if let Some(v) = &self.object_cache_workspace_root {
            settings.object_cache_workspace_root = Some(v.clone());
        }
        if let Some(v) = self.link_objects_in_library {
            settings.link_objects_in_library = v;
        }
        if let Some(v) = self.function_level_linking {
            settings.function_level_linking = v;
        }
        Ok(settings)
    }
}

fn parse_optimization(v: &str) -> Result<OptimizationLevel, ConfigError> {
    match v {
        "none" => Ok(OptimizationLevel::None),
        "partial" => Ok(OptimizationLevel::Partial),
        "full" => Ok(OptimizationLevel::Full),
        other => Err(ConfigError::Invalid {
            path: PathBuf::from(PROJECT_FILE_NAME),
            message: format!("unknown optimization level {other:?} (want none/partial/full)"),
        }),
    }
}

fn parse_language(v: &str) -> Result<Language, ConfigError> {
    match v {
        "c" => Ok(Language::C),
        "c++" | "cpp" => Ok(Language::Cpp),
        "objective-c" | "objc" => Ok(Language::ObjectiveC),
        other => Err(ConfigError::Invalid {
            path: PathBuf::from(PROJECT_FILE_NAME),
            message: format!("unknown language {other:?} (want c/c++/objective-c)"),
        }),
    }
}

#[derive(Debug, Deserialize)]
pub struct VariantToml {
    #[serde(default)]
    pub settings: SettingsToml,
}

#[derive(Debug, Deserialize)]
pub struct PchToml {
    pub name: String,
    pub target: PathBuf,
    pub source: PathBuf,
    pub header: String,
    pub companion_object: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectToml {
    pub name: String,
    pub target: PathBuf,
    pub source: PathBuf,
    pub pch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryToml {
    pub name: String,
    pub target: PathBuf,
    pub objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModuleToml {
    pub name: String,
    pub target: PathBuf,
    pub objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProgramToml {
    pub name: String,
    pub target: PathBuf,
    pub objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModuleCopyToml {
    pub dir: PathBuf,
    pub modules: Vec<PathBuf>,
    #[serde(default)]
    pub after: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProjectToml {
    pub settings: SettingsToml,
    pub variants: HashMap<String, VariantToml>,
    #[serde(rename = "pch")]
    pub pchs: Vec<PchToml>,
    #[serde(rename = "object")]
    pub objects: Vec<ObjectToml>,
    #[serde(rename = "library")]
    pub libraries: Vec<LibraryToml>,
    #[serde(rename = "module")]
    pub modules: Vec<ModuleToml>,
    #[serde(rename = "program")]
    pub programs: Vec<ProgramToml>,
    #[serde(rename = "module_copy")]
    pub module_copies: Vec<ModuleCopyToml>,
    pub default_targets: Vec<String>,
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn project_file_for(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(PROJECT_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

fn missing_name_error(kind: &str, name: &str, owner: &Path) -> ConfigError {
    ConfigError::Invalid {
        path: owner.to_path_buf(),
        message: format!("unknown {kind} {name:?}"),
    }
}

/// The `BuildDescription` implementation backing `odb build`: a flat TOML
/// project file (see module docs). The same loader instance can evaluate
/// any number of project files and variants; `overlay` (from `--config`)
/// is applied to every one of them, after the project's own `[settings]`
/// and before the selected variant's overlay.
#[derive(Default)]
pub struct TomlProject {
    pub overlay: Option<SettingsToml>,
}

impl TomlProject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overlay(overlay: SettingsToml) -> Self {
        Self { overlay: Some(overlay) }
    }
}

impl BuildDescription for TomlProject {
    fn evaluate(
        &self,
        path: &Path,
        variant: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<BuildGraph, ConfigError> {
        let project_path = project_file_for(path);
        let root = project_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

        let text = std::fs::read_to_string(&project_path).map_err(|e| ConfigError::Invalid {
            path: project_path.clone(),
            message: format!("failed to read project file: {e}"),
        })?;
        let project: ProjectToml = toml::from_str(&text).map_err(|e| ConfigError::Invalid {
            path: project_path.clone(),
            message: format!("failed to parse project file: {e}"),
        })?;

        let mut settings = CompilerSettings::default().workspace_root(root.clone());
        settings = project.settings.apply_to(settings)?;
        if let Some(overlay) = &self.overlay {
            settings = overlay.apply_to(settings)?;
        }

        if !variant.is_empty() && variant != "default" {
            match project.variants.get(variant) {
                Some(v) => settings = v.settings.apply_to(settings)?,
                None if project.variants.is_empty() => {}
                None => {
                    return Err(ConfigError::UnknownVariant {
                        name: variant.to_string(),
                        known: project.variants.keys().cloned().collect(),
                    })
                }
            }
        }

        for (key, value) in args {
            if key == "variant" {
                continue;
            }
            settings = settings.add_define(key.clone(), if value.is_empty() { None } else { Some(value.as_str()) });
        }

        let mut graph = BuildGraph::new();
        let mut names: HashMap<String, NodeId> = HashMap::new();

        for pch in &project.pchs {
            let id = graph.push(Node::Pch(PchNode {
                target: resolve(&root, &pch.target),
                source: resolve(&root, &pch.source),
                header: pch.header.clone(),
                companion_object: pch.companion_object.as_ref().map(|p| resolve(&root, p)),
                settings: settings.clone(),
            }));
            names.insert(pch.name.clone(), id);
        }

        for object in &project.objects {
            let pch = object
                .pch
                .as_ref()
                .map(|name| names.get(name).copied().ok_or_else(|| missing_name_error("pch", name, &project_path)))
                .transpose()?;
            let id = graph.push(Node::Object(ObjectNode {
                target: resolve(&root, &object.target),
                source: resolve(&root, &object.source),
                pch,
                settings: settings.clone(),
            }));
            names.insert(object.name.clone(), id);
        }

        let resolve_objects = |objects: &[String], names: &HashMap<String, NodeId>| -> Result<Vec<NodeId>, ConfigError> {
            objects
                .iter()
                .map(|name| names.get(name).copied().ok_or_else(|| missing_name_error("object", name, &project_path)))
                .collect()
        };

        for library in &project.libraries {
            let id = graph.push(Node::Library(LibraryNode {
                target: resolve(&root, &library.target),
                objects: resolve_objects(&library.objects, &names)?,
                settings: settings.clone(),
            }));
            names.insert(library.name.clone(), id);
        }

        for module in &project.modules {
            let id = graph.push(Node::Module(ModuleNode {
                target: resolve(&root, &module.target),
                objects: resolve_objects(&module.objects, &names)?,
                settings: settings.clone(),
            }));
            names.insert(module.name.clone(), id);
        }

        for program in &project.programs {
            let id = graph.push(Node::Program(ProgramNode {
                target: resolve(&root, &program.target),
                objects: resolve_objects(&program.objects, &names)?,
                settings: settings.clone(),
            }));
            names.insert(program.name.clone(), id);
        }

        for copy in &project.module_copies {
            let deps = copy
                .after
                .iter()
                .map(|name| names.get(name).copied().ok_or_else(|| missing_name_error("target", name, &project_path)))
                .collect::<Result<Vec<_>, _>>()?;
            graph.push(Node::ModuleCopy(ModuleCopyNode {
                dir: resolve(&root, &copy.dir),
                modules: copy.modules.iter().map(|m| resolve(&root, m)).collect(),
                deps,
            }));
        }

        if !project.default_targets.is_empty() {
            graph.default_targets = project
                .default_targets
                .iter()
                .map(|name| names.get(name).copied().ok_or_else(|| missing_name_error("target", name, &project_path)))
                .collect::<Result<Vec<_>, _>>()?;
        }

        Ok(graph)
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
