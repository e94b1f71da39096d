use std::collections::HashMap;

use serde::Deserialize;

use crate::capture::{ExceptionEvent, HostCapabilities};
use crate::{Error, Result};

use super::memory::{HostOp, InMemoryHost, MethodSpec, SlotContent, StackFrame};
use super::runtime::{LineEntry, LocalVariableEntry, MethodRef, ObjectRef, ThreadRef, TypeRef};

/// JSON description of a host at the moment an exception is thrown.
///
/// Types, methods and objects are referred to by the keys given in the file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default = "default_true")]
    pub line_numbers: bool,
    #[serde(default = "default_true")]
    pub sink: bool,
    #[serde(default)]
    pub types: Vec<ScenarioType>,
    #[serde(default)]
    pub methods: Vec<ScenarioMethod>,
    #[serde(default)]
    pub objects: Vec<ScenarioObject>,
    #[serde(default)]
    pub threads: Vec<ScenarioThread>,
    #[serde(default)]
    pub failing: Vec<HostOp>,
    pub event: ScenarioEvent,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioType {
    pub name: String,
    pub source_file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioMethod {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub generic: Option<String>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// `[startLocation, line]` pairs.
    #[serde(default)]
    pub line_table: Option<Vec<(i64, i32)>>,
    #[serde(default)]
    pub locals: Vec<LocalVariableEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioObject {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioSlot {
    Int(i32),
    Float(f32),
    Double(f64),
    Long(i64),
    Object(Option<String>),
}

#[derive(Debug, Deserialize)]
pub struct ScenarioFrame {
    pub method: String,
    pub location: i64,
    #[serde(default)]
    pub slots: HashMap<i32, ScenarioSlot>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioThread {
    pub id: u64,
    pub frames: Vec<ScenarioFrame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioEvent {
    pub thread: u64,
    pub method: String,
    pub location: i64,
    pub exception: String,
    #[serde(default)]
    pub catch_method: Option<String>,
    #[serde(default)]
    pub catch_location: i64,
}

/// A host built from a scenario, ready to replay its event.
pub struct Replay {
    pub host: InMemoryHost,
    pub event: ExceptionEvent,
    pub capabilities: HostCapabilities,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn build(self) -> Result<Replay> {
        let host = if self.sink { InMemoryHost::with_sink() } else { InMemoryHost::new() };

        let mut types: HashMap<String, TypeRef> = HashMap::new();
        for ty in &self.types {
            let handle = host.define_type(&ty.name, ty.source_file.as_deref());
            types.insert(ty.name.clone(), handle);
        }
        let type_of = |name: &str| {
            types
                .get(name)
                .copied()
                .ok_or_else(|| Error::InvalidScenario(format!("unknown type '{}'", name)))
        };

        let mut methods: HashMap<String, MethodRef> = HashMap::new();
        for m in self.methods {
            let owner = type_of(&m.owner)?;
            let spec = MethodSpec {
                name: m.name,
                descriptor: m.descriptor,
                generic: m.generic,
                modifiers: if m.is_static { crate::signature::ACC_STATIC } else { 0x0001 },
                line_table: m.line_table.map(|entries| {
                    entries
                        .into_iter()
                        .map(|(start_location, line_number)| LineEntry { start_location, line_number })
                        .collect()
                }),
                locals: m.locals,
            };
            methods.insert(m.id, host.define_method(owner, spec));
        }
        let method_of = |id: &str| {
            methods
                .get(id)
                .copied()
                .ok_or_else(|| Error::InvalidScenario(format!("unknown method '{}'", id)))
        };

        let mut objects: HashMap<String, ObjectRef> = HashMap::new();
        for object in &self.objects {
            objects.insert(object.id.clone(), host.new_instance(type_of(&object.type_name)?));
        }
        let object_of = |id: &str| {
            objects
                .get(id)
                .copied()
                .ok_or_else(|| Error::InvalidScenario(format!("unknown object '{}'", id)))
        };

        for thread in self.threads {
            let mut frames = Vec::with_capacity(thread.frames.len());
            for frame in thread.frames {
                let mut built = StackFrame::new(method_of(&frame.method)?, frame.location);
                for (slot, value) in frame.slots {
                    let content = match value {
                        ScenarioSlot::Int(v) => SlotContent::Int(v),
                        ScenarioSlot::Float(v) => SlotContent::Float(v),
                        ScenarioSlot::Double(v) => SlotContent::Double(v),
                        ScenarioSlot::Long(v) => SlotContent::Long(v),
                        ScenarioSlot::Object(None) => SlotContent::Object(None),
                        ScenarioSlot::Object(Some(id)) => SlotContent::Object(Some(object_of(&id)?)),
                    };
                    built = built.slot(slot, content);
                }
                frames.push(built);
            }
            host.set_stack(ThreadRef(thread.id), frames);
        }

        let event = ExceptionEvent {
            thread: ThreadRef(self.event.thread),
            method: method_of(&self.event.method)?,
            location: self.event.location,
            exception: object_of(&self.event.exception)?,
            catch_method: self.event.catch_method.as_deref().map(method_of).transpose()?,
            catch_location: self.event.catch_location,
        };

        // Failures apply to the replay only, not to building the scenario.
        for op in self.failing {
            host.fail(op);
        }

        Ok(Replay {
            host,
            event,
            capabilities: HostCapabilities { line_numbers: self.line_numbers },
        })
    }
}
