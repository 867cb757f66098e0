//! Script detectors written in Rhai.
//!
//! A script defines `fn init(db)` and registers hook functions by name:
//!
//! ```text
//! fn init(db) {
//!     db.audit("issue", "create", "preset");
//!     db.react("issue", "set", "notify");
//! }
//!
//! fn preset(ctx, newvalues) {
//!     if newvalues.status == () { newvalues.status = lookup("status", "unread"); }
//!     newvalues
//! }
//! ```
//!
//! Auditors return the new map (or `()` to leave it alone). Reactors get
//! `()` for create, the old-values map for set, or `"retired"` /
//! `"restored"`. `set` and `create` calls are queued and dispatched once the
//! script function has returned.

use crate::bootstrap::Detector;
use crate::change::{OldValues, ProposedChange};
use crate::database::Database;
use crate::error::{DetectorError, HookError, Reject};
use crate::hooks::{Event, HookKind};
use crate::reader::Reader;
use hyperhook_db::PropMap;
use rhai::{AST, CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Map, Position, Scope};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A compiled `.rhai` detector.
pub struct ScriptDetector {
    module: Arc<ScriptModule>,
}

struct ScriptModule {
    name: String,
    engine: Engine,
    ast: AST,
    state: Arc<Mutex<CallState>>,
    /// Serializes calls into the script across database handles.
    call_lock: Mutex<()>,
}

#[derive(Default)]
struct CallState {
    reader: Option<Reader>,
    reject: Option<Reject>,
    writes: Vec<QueuedWrite>,
}

enum QueuedWrite {
    Set {
        class: String,
        nodeid: String,
        props: PropMap,
    },
    Create {
        class: String,
        props: PropMap,
    },
}

#[derive(Debug, Clone)]
struct ScriptHook {
    kind: HookKind,
    class: String,
    event: Event,
    function: String,
}

/// The `db` object handed to `init`.
#[derive(Debug, Clone, Default)]
struct Registrar {
    hooks: Arc<Mutex<Vec<ScriptHook>>>,
}

impl Registrar {
    fn push(
        &mut self,
        kind: HookKind,
        class: &str,
        event: &str,
        function: &str,
    ) -> Result<(), Box<EvalAltResult>> {
        let event: Event = event.parse().map_err(runtime_error)?;
        self.hooks
            .lock()
            .map_err(|_| runtime_error("registrar lock poisoned"))?
            .push(ScriptHook {
                kind,
                class: class.to_string(),
                event,
                function: function.to_string(),
            });
        Ok(())
    }
}

impl ScriptDetector {
    /// Compile `source`. `name` is used in hook names and log lines.
    pub fn compile(name: impl Into<String>, source: &str) -> Result<Self, DetectorError> {
        let name = name.into();
        let state = Arc::new(Mutex::new(CallState::default()));
        let engine = build_engine(&name, &state);
        let ast = engine.compile(source).map_err(|err| DetectorError::Script {
            name: name.clone(),
            message: err.to_string(),
        })?;
        if !ast.iter_functions().any(|f| f.name == "init" && f.params.len() == 1) {
            return Err(DetectorError::Script {
                name,
                message: "no `fn init(db)` defined".to_string(),
            });
        }
        Ok(Self {
            module: Arc::new(ScriptModule {
                name,
                engine,
                ast,
                state,
                call_lock: Mutex::new(()),
            }),
        })
    }

    /// Read and compile a script file. The detector is named after the file
    /// stem.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DetectorError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|e| DetectorError::Io(format!("{}: {e}", path.display())))?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::compile(name, &source)
    }
}

impl Detector for ScriptDetector {
    fn name(&self) -> &str {
        &self.module.name
    }

    fn register(&self, db: &mut Database) -> Result<(), DetectorError> {
        let module = &self.module;
        let registrar = Registrar::default();
        module
            .call(db, "init", true, (registrar.clone(),))
            .map_err(|err| DetectorError::Script {
                name: module.name.clone(),
                message: err.to_string(),
            })?;

        let hooks = registrar
            .hooks
            .lock()
            .map_err(|_| DetectorError::Script {
                name: module.name.clone(),
                message: "registrar lock poisoned".to_string(),
            })?
            .clone();

        for hook in hooks {
            if !module
                .ast
                .iter_functions()
                .any(|f| f.name == hook.function && f.params.len() == 2)
            {
                return Err(DetectorError::Script {
                    name: module.name.clone(),
                    message: format!(
                        "init registered {:?} but no `fn {}(ctx, values)` is defined",
                        hook.function, hook.function
                    ),
                });
            }
            let label = format!("{}::{}", module.name, hook.function);
            let target = Arc::clone(module);
            let function = hook.function.clone();
            match hook.kind {
                HookKind::Auditor => db.audit(
                    &hook.class,
                    hook.event,
                    label,
                    move |db: &mut Database,
                          class: &str,
                          nodeid: Option<&str>,
                          values: &mut ProposedChange| {
                        target.run_auditor(db, &function, class, nodeid, values)
                    },
                )?,
                HookKind::Reactor => db.react(
                    &hook.class,
                    hook.event,
                    label,
                    move |db: &mut Database, class: &str, nodeid: &str, old: &OldValues| {
                        target.run_reactor(db, &function, class, nodeid, old)
                    },
                )?,
            }
        }
        Ok(())
    }
}

impl ScriptModule {
    fn run_auditor(
        &self,
        db: &mut Database,
        function: &str,
        class: &str,
        nodeid: Option<&str>,
        newvalues: &mut ProposedChange,
    ) -> Result<(), HookError> {
        let ctx = context(db, class, nodeid);
        let values = rhai::serde::to_dynamic(newvalues.values())
            .map_err(|err| HookError::failed(format!("{}: {err}", self.name)))?;
        let (result, writes) = self.call(db, function, false, (ctx, values))?;
        if !result.is_unit() {
            let map: PropMap = rhai::serde::from_dynamic(&result).map_err(|err| {
                HookError::failed(format!(
                    "{}::{function} must return a property map or (): {err}",
                    self.name
                ))
            })?;
            newvalues.replace(map);
        }
        apply_writes(db, writes)
    }

    fn run_reactor(
        &self,
        db: &mut Database,
        function: &str,
        class: &str,
        nodeid: &str,
        oldvalues: &OldValues,
    ) -> Result<(), HookError> {
        let ctx = context(db, class, Some(nodeid));
        let old = match oldvalues {
            OldValues::Created => Dynamic::UNIT,
            OldValues::Changed(map) => rhai::serde::to_dynamic(map)
                .map_err(|err| HookError::failed(format!("{}: {err}", self.name)))?,
            OldValues::Retired => "retired".into(),
            OldValues::Restored => "restored".into(),
        };
        let (_, writes) = self.call(db, function, false, (ctx, old))?;
        apply_writes(db, writes)
    }

    /// Call one script function with the database reader installed for the
    /// host functions. Returns the result and the queued writes.
    fn call(
        &self,
        db: &Database,
        function: &str,
        eval_ast: bool,
        args: impl FuncArgs,
    ) -> Result<(Dynamic, Vec<QueuedWrite>), HookError> {
        let _guard = self
            .call_lock
            .lock()
            .map_err(|_| HookError::failed(format!("{}: call lock poisoned", self.name)))?;
        self.with_state(|state| {
            *state = CallState {
                reader: Some(db.reader().clone()),
                ..CallState::default()
            };
        })?;

        let options = CallFnOptions::new().eval_ast(eval_ast).rewind_scope(true);
        let result = self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut Scope::new(),
            &self.ast,
            function,
            args,
        );
        let state = self.with_state(std::mem::take)?;

        match (result, state.reject) {
            (Ok(value), _) => Ok((value, state.writes)),
            (Err(_), Some(reject)) => Err(HookError::Reject(reject)),
            (Err(err), None) => Err(HookError::failed(format!(
                "{}::{function}: {err}",
                self.name
            ))),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut CallState) -> T) -> Result<T, HookError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| HookError::failed(format!("{}: state lock poisoned", self.name)))?;
        Ok(f(&mut state))
    }
}

fn context(db: &Database, class: &str, nodeid: Option<&str>) -> Map {
    let mut ctx = Map::new();
    ctx.insert("class".into(), class.into());
    ctx.insert(
        "nodeid".into(),
        nodeid.map_or(Dynamic::UNIT, |id| id.into()),
    );
    ctx.insert(
        "tx_source".into(),
        db.tx_source()
            .map_or(Dynamic::UNIT, |source| source.as_str().into()),
    );
    ctx.insert("uid".into(), db.getuid().into());
    ctx
}

fn apply_writes(db: &mut Database, writes: Vec<QueuedWrite>) -> Result<(), HookError> {
    for write in writes {
        match write {
            QueuedWrite::Set {
                class,
                nodeid,
                props,
            } => db.set(&class, &nodeid, props)?,
            QueuedWrite::Create { class, props } => {
                db.create(&class, props)?;
            }
        }
    }
    Ok(())
}

fn build_engine(name: &str, state: &Arc<Mutex<CallState>>) -> Engine {
    let mut engine = Engine::new();

    {
        let name = name.to_string();
        engine.on_print(move |text| tracing::info!(detector = %name, "{text}"));
    }
    {
        let name = name.to_string();
        engine.on_debug(move |text, _, _| tracing::debug!(detector = %name, "{text}"));
    }

    engine
        .register_type_with_name::<Registrar>("Db")
        .register_fn(
            "audit",
            |db: &mut Registrar, class: &str, event: &str, function: &str| {
                db.push(HookKind::Auditor, class, event, function)
            },
        )
        .register_fn(
            "react",
            |db: &mut Registrar, class: &str, event: &str, function: &str| {
                db.push(HookKind::Reactor, class, event, function)
            },
        );

    for (fn_name, raw) in [("reject", false), ("reject_raw", true)] {
        let state = Arc::clone(state);
        engine.register_fn(
            fn_name,
            move |message: &str| -> Result<(), Box<EvalAltResult>> {
                let reject = if raw {
                    Reject::raw(message)
                } else {
                    Reject::new(message)
                };
                state
                    .lock()
                    .map_err(|_| runtime_error("state lock poisoned"))?
                    .reject = Some(reject);
                Err(runtime_error(format!("rejected: {message}")))
            },
        );
    }

    {
        let state = Arc::clone(state);
        engine.register_fn(
            "lookup",
            move |class: &str, key: &str| -> Result<Dynamic, Box<EvalAltResult>> {
                let reader = current_reader(&state)?;
                match reader.find_key(class, key) {
                    Ok(Some(id)) => Ok(id.into()),
                    Ok(None) => Ok(Dynamic::UNIT),
                    Err(err) => Err(runtime_error(err.to_string())),
                }
            },
        );
    }

    {
        let state = Arc::clone(state);
        engine.register_fn(
            "get",
            move |class: &str, nodeid: &str, prop: &str| -> Result<Dynamic, Box<EvalAltResult>> {
                let reader = current_reader(&state)?;
                let value = reader
                    .get(class, nodeid, prop)
                    .map_err(|err| runtime_error(err.to_string()))?;
                rhai::serde::to_dynamic(&value)
            },
        );
    }

    {
        let state = Arc::clone(state);
        engine.register_fn(
            "set",
            move |class: &str, nodeid: &str, values: Map| -> Result<(), Box<EvalAltResult>> {
                let props = props_from_map(values)?;
                queue(
                    &state,
                    QueuedWrite::Set {
                        class: class.to_string(),
                        nodeid: nodeid.to_string(),
                        props,
                    },
                )
            },
        );
    }

    {
        let state = Arc::clone(state);
        engine.register_fn(
            "create",
            move |class: &str, values: Map| -> Result<(), Box<EvalAltResult>> {
                let props = props_from_map(values)?;
                queue(
                    &state,
                    QueuedWrite::Create {
                        class: class.to_string(),
                        props,
                    },
                )
            },
        );
    }

    engine
}

fn current_reader(state: &Mutex<CallState>) -> Result<Reader, Box<EvalAltResult>> {
    state
        .lock()
        .map_err(|_| runtime_error("state lock poisoned"))?
        .reader
        .clone()
        .ok_or_else(|| runtime_error("database access outside a hook call"))
}

fn queue(state: &Mutex<CallState>, write: QueuedWrite) -> Result<(), Box<EvalAltResult>> {
    state
        .lock()
        .map_err(|_| runtime_error("state lock poisoned"))?
        .writes
        .push(write);
    Ok(())
}

fn props_from_map(values: Map) -> Result<PropMap, Box<EvalAltResult>> {
    rhai::serde::from_dynamic(&Dynamic::from_map(values))
}

fn runtime_error(message: impl Into<String>) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(message.into().into(), Position::NONE).into()
}
