use mesos_executor::executor::TaskData;
use mesos_executor::executor::task::FileData;
use mesos_executor::protocol::IdValue;
use mesos_executor::protocol::TaskInfo;
use mesos_executor::protocol::event::{
    CommandInfo, CommandUri, Environment, Resource, Scalar, Variable,
};

/// Builder for `TaskInfo` to simplify test setup.
#[derive(Debug, Clone)]
pub struct TaskInfoBuilder {
    info: TaskInfo,
    data: Option<TaskData>,
}

impl TaskInfoBuilder {
    /// A task running `cmd` through the plain command descriptor.
    pub fn new(id: &str, cmd: &str) -> Self {
        Self {
            info: TaskInfo {
                name: id.to_string(),
                task_id: IdValue::new(id),
                command: Some(CommandInfo {
                    value: Some(cmd.to_string()),
                    ..CommandInfo::default()
                }),
                ..TaskInfo::default()
            },
            data: None,
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        if let Some(command) = self.info.command.as_mut() {
            command.arguments.push(arg.to_string());
        }
        self
    }

    pub fn command_env(mut self, name: &str, value: &str) -> Self {
        if let Some(command) = self.info.command.as_mut() {
            command
                .environment
                .get_or_insert_with(Environment::default)
                .variables
                .push(Variable {
                    name: name.to_string(),
                    value: Some(value.to_string()),
                });
        }
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        if let Some(command) = self.info.command.as_mut() {
            command.uris.push(CommandUri {
                value: uri.to_string(),
            });
        }
        self
    }

    pub fn scalar(mut self, name: &str, value: f64) -> Self {
        self.info.resources.push(Resource {
            name: name.to_string(),
            scalar: Some(Scalar { value }),
        });
        self
    }

    fn data_mut(&mut self) -> &mut TaskData {
        self.data.get_or_insert_with(TaskData::default)
    }

    /// `KEY=VALUE` entry carried in the data blob.
    pub fn data_env(mut self, entry: &str) -> Self {
        self.data_mut().env.push(entry.to_string());
        self
    }

    pub fn stop_timeout(mut self, secs: u64) -> Self {
        self.data_mut().stop_timeout = Some(secs);
        self
    }

    /// A file with the given base64 content, relative to the sandbox.
    pub fn local_file(mut self, path: &str, content_b64: &str, mode: Option<&str>) -> Self {
        self.data_mut().local_files.push(FileData {
            path: path.to_string(),
            content: content_b64.to_string(),
            mode: mode.map(str::to_string),
            user: None,
        });
        self
    }

    /// Use a raw `data` value, bypassing the blob encoding.
    pub fn raw_data(mut self, data: &str) -> Self {
        self.data = None;
        self.info.data = Some(data.to_string());
        self
    }

    pub fn build(self) -> TaskInfo {
        let mut info = self.info;
        if let Some(data) = self.data {
            info.data = Some(data.to_blob().expect("task data encodes"));
        }
        info
    }
}
