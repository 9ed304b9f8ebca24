// src/executor/task.rs

//! Turning task descriptors into supervised process specs.

use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ExecutorError, Result};
use crate::fs::FileSystem;
use crate::protocol::TaskInfo;
use crate::supervisor::{LocalFile, ProcessResources, ProcessSpec};
use crate::types::TaskState;

/// Stop timeout used when the task data does not set one.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;
/// Default mode for secrets written into the sandbox.
pub const SECRET_FILE_MODE: u32 = 0o600;

/// Process description embedded (base64 JSON) in `TaskInfo.data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub pid_file: Option<String>,
    #[serde(default)]
    pub uris: Vec<String>,
    #[serde(default)]
    pub local_files: Vec<FileData>,
    #[serde(default)]
    pub secrets: Vec<FileData>,
    #[serde(default)]
    pub stop_cmd: Option<String>,
    #[serde(default)]
    pub stop_timeout: Option<u64>,
    #[serde(default)]
    pub start_grace_period: Option<u64>,
}

impl TaskData {
    /// Encode as the base64 blob expected in `TaskInfo.data`.
    pub fn to_blob(&self) -> Result<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileData {
    /// Relative to the sandbox unless absolute.
    pub path: String,
    /// Base64 of the contents.
    #[serde(default)]
    pub content: String,
    /// Octal string, e.g. `"0644"`.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

/// One scheduled task and the process that backs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTask {
    pub id: String,
    pub name: String,
    pub state: TaskState,
    pub spec: ProcessSpec,
    /// The supervisor accepted `create` for this task.
    #[serde(default)]
    pub created: bool,
    /// `create` has been issued and has not returned yet.
    #[serde(default)]
    pub creating: bool,
}

impl ProcessTask {
    /// Build a task from its descriptor. Any problem with the embedded data
    /// is an `InvalidTask` error.
    pub fn from_task_info(info: &TaskInfo, sandbox: &Path) -> Result<Self> {
        let id = info.task_id.value.trim().to_string();
        if id.is_empty() {
            return Err(ExecutorError::invalid_task(&info.name, "task id is empty"));
        }

        let data = match info.data.as_deref() {
            Some(blob) if !blob.trim().is_empty() => decode_task_data(&id, blob)?,
            _ => TaskData::default(),
        };

        let command = info.command.clone().unwrap_or_default();
        let cmd = data
            .cmd
            .clone()
            .or(command.value)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ExecutorError::invalid_task(&id, "no command to run"))?;
        let args = if data.args.is_empty() {
            command.arguments
        } else {
            data.args.clone()
        };

        let mut env: Vec<String> = command
            .environment
            .map(|e| e.variables)
            .unwrap_or_default()
            .into_iter()
            .map(|v| format!("{}={}", v.name, v.value.unwrap_or_default()))
            .collect();
        for entry in &data.env {
            if !entry.contains('=') {
                return Err(ExecutorError::invalid_task(
                    &id,
                    format!("env entry '{entry}' is not KEY=VALUE"),
                ));
            }
            env.push(entry.clone());
        }

        let mut uris: Vec<String> = command.uris.into_iter().map(|u| u.value).collect();
        uris.extend(data.uris.iter().cloned());

        let dir = match data.dir.as_deref() {
            Some(dir) => sandbox_path(&id, sandbox, dir)?,
            None => sandbox.to_path_buf(),
        };
        let pid_file = data
            .pid_file
            .as_deref()
            .map(|p| sandbox_path(&id, sandbox, p))
            .transpose()?;

        let mut local_files = Vec::new();
        for file in &data.local_files {
            local_files.push(local_file(&id, sandbox, file, None)?);
        }
        for secret in &data.secrets {
            local_files.push(local_file(&id, sandbox, secret, Some(SECRET_FILE_MODE))?);
        }

        let spec = ProcessSpec {
            id: id.clone(),
            cmd,
            args,
            env,
            dir,
            pid_file,
            uris,
            local_files,
            stop_cmd: data.stop_cmd.clone(),
            stop_timeout: data.stop_timeout.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS),
            start_grace_period: data.start_grace_period.unwrap_or(0),
            resources: resources_of(info),
        };

        debug!(task_id = %id, cmd = %spec.cmd, files = spec.local_files.len(), "built process spec");

        Ok(Self {
            id,
            name: info.name.clone(),
            state: TaskState::Staging,
            spec,
            created: false,
            creating: false,
        })
    }

    /// Stand-in for a descriptor that could not be turned into a spec, so the
    /// task can still be tracked and reported.
    pub fn unlaunchable(info: &TaskInfo, sandbox: &Path, state: TaskState) -> Self {
        Self {
            id: info.task_id.value.clone(),
            name: info.name.clone(),
            state,
            spec: ProcessSpec {
                id: info.task_id.value.clone(),
                cmd: String::new(),
                args: Vec::new(),
                env: Vec::new(),
                dir: sandbox.to_path_buf(),
                pid_file: None,
                uris: Vec::new(),
                local_files: Vec::new(),
                stop_cmd: None,
                stop_timeout: DEFAULT_STOP_TIMEOUT_SECS,
                start_grace_period: 0,
                resources: ProcessResources::default(),
            },
            created: false,
            creating: false,
        }
    }
}

fn decode_task_data(task_id: &str, blob: &str) -> Result<TaskData> {
    let bytes = STANDARD
        .decode(blob.trim())
        .map_err(|e| ExecutorError::invalid_task(task_id, format!("data is not base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ExecutorError::invalid_task(task_id, format!("data is not valid JSON: {e}")))
}

/// Resolve `path` under the sandbox, refusing anything that escapes it.
fn sandbox_path(task_id: &str, sandbox: &Path, path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let relative = if candidate.is_absolute() {
        candidate.strip_prefix(sandbox).map_err(|_| {
            ExecutorError::invalid_task(task_id, format!("path '{path}' is outside the sandbox"))
        })?
    } else {
        candidate
    };

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ExecutorError::invalid_task(
            task_id,
            format!("path '{path}' escapes the sandbox"),
        ));
    }

    Ok(sandbox.join(relative))
}

fn local_file(
    task_id: &str,
    sandbox: &Path,
    file: &FileData,
    default_mode: Option<u32>,
) -> Result<LocalFile> {
    if file.path.trim().is_empty() {
        return Err(ExecutorError::invalid_task(task_id, "local file has no path"));
    }
    STANDARD.decode(file.content.trim()).map_err(|e| {
        ExecutorError::invalid_task(
            task_id,
            format!("content of '{}' is not base64: {e}", file.path),
        )
    })?;

    let mode = match file.mode.as_deref() {
        Some(mode) => Some(u32::from_str_radix(mode.trim(), 8).map_err(|_| {
            ExecutorError::invalid_task(
                task_id,
                format!("mode '{mode}' of '{}' is not octal", file.path),
            )
        })?),
        None => default_mode,
    };

    Ok(LocalFile {
        path: sandbox_path(task_id, sandbox, &file.path)?,
        content: file.content.trim().to_string(),
        mode,
        user: file.user.clone(),
    })
}

fn resources_of(info: &TaskInfo) -> ProcessResources {
    let mut resources = ProcessResources::default();
    for resource in &info.resources {
        let Some(scalar) = resource.scalar else {
            continue;
        };
        match resource.name.as_str() {
            "cpus" => resources.cpus = Some(scalar.value),
            "mem" => resources.mem_mb = Some(scalar.value),
            "disk" => resources.disk_mb = Some(scalar.value),
            _ => {}
        }
    }
    resources
}

/// Write a task's local files into the sandbox, then apply mode and owner.
pub fn materialize_local_files(fs: &dyn FileSystem, spec: &ProcessSpec) -> Result<()> {
    for file in &spec.local_files {
        let contents = STANDARD
            .decode(&file.content)
            .map_err(|e| ExecutorError::invalid_task(&spec.id, e.to_string()))?;
        fs.write(&file.path, &contents)?;
        if let Some(mode) = file.mode {
            fs.set_mode(&file.path, mode)?;
        }
        if let Some(user) = file.user.as_deref() {
            fs.set_owner(&file.path, user)?;
        }
        debug!(task_id = %spec.id, path = ?file.path, "materialised local file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::protocol::IdValue;
    use crate::protocol::event::{CommandInfo, Resource, Scalar};

    fn info_with(data: &TaskData) -> TaskInfo {
        TaskInfo {
            name: "web".to_string(),
            task_id: IdValue::new("web.1"),
            resources: vec![Resource {
                name: "mem".to_string(),
                scalar: Some(Scalar { value: 128.0 }),
            }],
            command: None,
            data: Some(data.to_blob().unwrap()),
        }
    }

    #[test]
    fn builds_spec_from_data_blob() {
        let data = TaskData {
            cmd: Some("./serve".to_string()),
            env: vec!["PORT=8080".to_string()],
            dir: Some("app".to_string()),
            stop_timeout: Some(30),
            local_files: vec![FileData {
                path: "conf/app.env".to_string(),
                content: STANDARD.encode("A=1"),
                mode: Some("0644".to_string()),
                user: None,
            }],
            secrets: vec![FileData {
                path: "secrets/token".to_string(),
                content: STANDARD.encode("s3cr3t"),
                ..Default::default()
            }],
            ..Default::default()
        };

        let task = ProcessTask::from_task_info(&info_with(&data), Path::new("/sandbox")).unwrap();

        assert_eq!(task.id, "web.1");
        assert_eq!(task.state, TaskState::Staging);
        assert_eq!(task.spec.cmd, "./serve");
        assert_eq!(task.spec.env, vec!["PORT=8080".to_string()]);
        assert_eq!(task.spec.dir, PathBuf::from("/sandbox/app"));
        assert_eq!(task.spec.stop_timeout, 30);
        assert_eq!(task.spec.resources.mem_mb, Some(128.0));
        assert_eq!(task.spec.local_files[0].mode, Some(0o644));
        assert_eq!(task.spec.local_files[1].path, PathBuf::from("/sandbox/secrets/token"));
        assert_eq!(task.spec.local_files[1].mode, Some(SECRET_FILE_MODE));
    }

    #[test]
    fn reserialised_task_keeps_identity_command_env_and_stop_timeout() {
        let data = TaskData {
            cmd: Some("./worker".to_string()),
            env: vec!["A=1".to_string(), "B=2".to_string()],
            stop_timeout: Some(45),
            ..Default::default()
        };
        let task = ProcessTask::from_task_info(&info_with(&data), Path::new("/sandbox")).unwrap();

        let json = serde_json::to_string(&task).unwrap();
        let back: ProcessTask = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, task.id);
        assert_eq!(back.spec.cmd, "./worker");
        assert_eq!(back.spec.env, task.spec.env);
        assert_eq!(back.spec.stop_timeout, 45);
    }

    #[test]
    fn falls_back_to_command_info_without_data() {
        let info = TaskInfo {
            name: "batch".to_string(),
            task_id: IdValue::new("batch.1"),
            command: Some(CommandInfo {
                value: Some("echo hi".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let task = ProcessTask::from_task_info(&info, Path::new("/sandbox")).unwrap();
        assert_eq!(task.spec.cmd, "echo hi");
        assert_eq!(task.spec.dir, PathBuf::from("/sandbox"));
        assert_eq!(task.spec.stop_timeout, DEFAULT_STOP_TIMEOUT_SECS);
    }

    #[test]
    fn rejects_bad_data() {
        let sandbox = Path::new("/sandbox");

        let mut info = info_with(&TaskData::default());
        info.data = Some("%%% not base64".to_string());
        assert!(matches!(
            ProcessTask::from_task_info(&info, sandbox),
            Err(ExecutorError::InvalidTask { .. })
        ));

        // No command anywhere.
        let info = info_with(&TaskData::default());
        assert!(ProcessTask::from_task_info(&info, sandbox).is_err());

        let escaping = TaskData {
            cmd: Some("true".to_string()),
            local_files: vec![FileData {
                path: "../../etc/passwd".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(ProcessTask::from_task_info(&info_with(&escaping), sandbox).is_err());

        let bad_mode = TaskData {
            cmd: Some("true".to_string()),
            local_files: vec![FileData {
                path: "f".to_string(),
                mode: Some("rw-r--r--".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(ProcessTask::from_task_info(&info_with(&bad_mode), sandbox).is_err());
    }

    #[test]
    fn materialises_files_with_mode_and_owner() {
        let data = TaskData {
            cmd: Some("true".to_string()),
            local_files: vec![FileData {
                path: "conf/app.env".to_string(),
                content: STANDARD.encode("A=1"),
                mode: Some("640".to_string()),
                user: Some("nobody".to_string()),
            }],
            ..Default::default()
        };
        let task = ProcessTask::from_task_info(&info_with(&data), Path::new("/sandbox")).unwrap();

        let fs = MockFileSystem::new();
        materialize_local_files(&fs, &task.spec).unwrap();

        let file = fs.file("/sandbox/conf/app.env").unwrap();
        assert_eq!(file.content, b"A=1");
        assert_eq!(file.mode, Some(0o640));
        assert_eq!(file.owner.as_deref(), Some("nobody"));
    }
}
