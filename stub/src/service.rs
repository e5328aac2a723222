//! Method dispatch behind `Invoke`.
//!
//! Every call answers with an envelope: the method result on success, the
//! error text otherwise. Methods without arguments reject a payload; methods
//! with arguments reject a missing or malformed one.

use std::sync::Arc;

use libevm_interop::codec::{HexBig, HexBytes, HexU64};
use libevm_interop::params::*;
use libevm_interop::{Envelope, Handle, TraceOptions, TracerResult};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::Database;
use crate::error::{StubError, StubResult};
use crate::evm::Executor;
use crate::handles::Handles;
use crate::host_bridge;
use crate::log::{self, Level};
use crate::state::StateDb;
use crate::tracer::{FrameStart, Tracer};

static SERVICE: Lazy<Service> = Lazy::new(Service::default);

pub fn service() -> &'static Service {
    &SERVICE
}

/// Arguments of `CallbackInvoke`: call host callback `handle` with `args`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CallbackInvokeParams {
    pub handle: Handle,
    pub args: String,
    #[serde(default)]
    pub expect_result: bool,
}

#[derive(Default)]
pub struct Service {
    databases: Handles<Arc<Database>>,
    states: Handles<Arc<Mutex<StateDb>>>,
    tracers: Handles<Arc<Mutex<Tracer>>>,
}

impl Service {
    /// Run `method` and encode the envelope.
    pub fn invoke(&self, method: &str, args: Option<&str>) -> String {
        let envelope = match self.dispatch(method, args) {
            Ok(result) => Envelope::success(result),
            Err(err) => {
                log::log(
                    Level::Debug,
                    "call failed",
                    &[("method", method.into()), ("err", err.to_string().into())],
                );
                Envelope::failure(err.to_string())
            }
        };
        serde_json::to_string(&envelope).unwrap_or_else(|e| {
            format!(r#"{{"error":{}}}"#, Value::from(format!("encoding response: {}", e)))
        })
    }

    pub fn dispatch(&self, method: &str, args: Option<&str>) -> StubResult<Value> {
        match method {
            // ── Persistent store ──
            "DatabaseOpenMemoryDB" => {
                no_args(args)?;
                reply(self.databases.add(Arc::new(Database::memory())))
            }
            "DatabaseOpenLevelDB" => {
                let p: LevelDbParams = parse(args)?;
                let db = Database::open(std::path::Path::new(&p.path), p.preimages)?;
                reply(self.databases.add(Arc::new(db)))
            }
            "DatabaseClose" => {
                let p: DatabaseParams = parse(args)?;
                self.databases.remove(p.database_handle)?;
                unit()
            }

            // ── State view ──
            "StateOpen" => {
                let p: StateParams = parse(args)?;
                let db = self.databases.get(p.database_handle)?;
                let state = StateDb::open(db, p.root)?;
                reply(self.states.add(Arc::new(Mutex::new(state))))
            }
            "StateClose" => {
                let p: HandleParams = parse(args)?;
                self.states.remove(p.handle)?;
                unit()
            }
            "StateFinalize" => {
                let p: HandleParams = parse(args)?;
                self.states.get(p.handle)?.lock().finalize();
                unit()
            }
            "StateIntermediateRoot" => {
                let p: HandleParams = parse(args)?;
                reply(self.states.get(p.handle)?.lock().intermediate_root())
            }
            "StateCommit" => {
                let p: HandleParams = parse(args)?;
                reply(self.states.get(p.handle)?.lock().commit()?)
            }
            "StateEmpty" => {
                let p: AccountParams = parse(args)?;
                reply(self.states.get(p.handle)?.lock().is_empty(&p.address))
            }
            "StateIsEoa" => {
                let p: AccountParams = parse(args)?;
                reply(self.states.get(p.handle)?.lock().is_eoa(&p.address))
            }
            "StateGetBalance" => {
                let p: AccountParams = parse(args)?;
                reply(HexBig(self.states.get(p.handle)?.lock().balance(&p.address)))
            }
            "StateAddBalance" => {
                let p: BalanceParams = parse(args)?;
                self.states.get(p.handle)?.lock().add_balance(p.address, &p.amount);
                unit()
            }
            "StateSubBalance" => {
                let p: BalanceParams = parse(args)?;
                self.states.get(p.handle)?.lock().sub_balance(p.address, &p.amount)?;
                unit()
            }
            "StateSetBalance" => {
                let p: BalanceParams = parse(args)?;
                self.states.get(p.handle)?.lock().set_balance(p.address, p.amount);
                unit()
            }
            "StateGetNonce" => {
                let p: AccountParams = parse(args)?;
                reply(HexU64(self.states.get(p.handle)?.lock().nonce(&p.address)))
            }
            "StateSetNonce" => {
                let p: NonceParams = parse(args)?;
                self.states.get(p.handle)?.lock().set_nonce(p.address, p.nonce);
                unit()
            }
            "StateGetCodeHash" => {
                let p: AccountParams = parse(args)?;
                reply(self.states.get(p.handle)?.lock().code_hash(&p.address))
            }
            "StateGetCode" => {
                let p: AccountParams = parse(args)?;
                reply(HexBytes(self.states.get(p.handle)?.lock().code(&p.address)))
            }
            "StateSetCode" => {
                let p: CodeParams = parse(args)?;
                self.states.get(p.handle)?.lock().set_code(p.address, p.code);
                unit()
            }
            "StateGetStorage" => {
                let p: StorageParams = parse(args)?;
                reply(self.states.get(p.handle)?.lock().storage(&p.address, &p.key))
            }
            "StateSetStorage" => {
                let p: SetStorageParams = parse(args)?;
                self.states.get(p.handle)?.lock().set_storage(p.address, p.key, p.value)?;
                unit()
            }
            "StateSnapshot" => {
                let p: HandleParams = parse(args)?;
                reply(self.states.get(p.handle)?.lock().snapshot())
            }
            "StateRevertToSnapshot" => {
                let p: SnapshotParams = parse(args)?;
                self.states.get(p.handle)?.lock().revert_to_snapshot(p.revision_id)?;
                unit()
            }
            "StateGetProof" => {
                let p: ProofParams = parse(args)?;
                let state = self.states.get(p.handle)?;
                let proof = state.lock().proof(p.address, p.root, &p.storage_keys)?;
                reply(proof)
            }
            "StateDump" => {
                let p: DumpParams = parse(args)?;
                let dump = self.states.get(p.handle)?.lock().dump();
                std::fs::write(&p.dump_file, serde_json::to_vec_pretty(&dump)?)?;
                unit()
            }

            // ── Access list ──
            "AccessSetup" => {
                let p: AccessParams = parse(args)?;
                self.states
                    .get(p.handle)?
                    .lock()
                    .access_setup(p.address, p.destination, p.coinbase, p.rules);
                unit()
            }
            "AccessAccount" => {
                let p: AccountParams = parse(args)?;
                reply(self.states.get(p.handle)?.lock().access_account(p.address))
            }
            "AccessSlot" => {
                let p: SlotParams = parse(args)?;
                reply(self.states.get(p.handle)?.lock().access_slot(p.address, p.slot))
            }

            // ── EVM ──
            "EvmApply" => {
                let p: EvmParams = parse(args)?;
                let state = self.states.get(p.handle)?;
                let tracer = p.context.tracer.map(|h| self.tracers.get(h)).transpose()?;
                let executor = Executor::new(&state, tracer.as_deref(), p.context);
                reply(executor.apply(p.invocation)?)
            }

            // ── Tracer ──
            "TracerCreate" => {
                let options: TraceOptions = parse(args)?;
                let tracer = Tracer::new(options)?;
                reply(self.tracers.add(Arc::new(Mutex::new(tracer))))
            }
            "TracerRemove" => {
                let p: TracerParams = parse(args)?;
                self.tracers.remove(p.tracer_handle)?;
                unit()
            }
            "TracerResult" => {
                let p: TracerParams = parse(args)?;
                let result = self.tracers.get(p.tracer_handle)?.lock().result();
                reply(TracerResult { result })
            }
            "TracerCaptureTxStart" => {
                let p: TracerTxStartParams = parse(args)?;
                self.tracers.get(p.tracer_handle)?.lock().capture_tx_start(p.gas_limit);
                unit()
            }
            "TracerCaptureTxEnd" => {
                let p: TracerTxEndParams = parse(args)?;
                self.tracers.get(p.tracer_handle)?.lock().capture_tx_end(p.rest_gas);
                unit()
            }
            "TracerCaptureStart" => {
                let p: TracerStartParams = parse(args)?;
                self.states.get(p.state_db)?;
                let frame = FrameStart {
                    op_code: if p.create {
                        libevm_interop::TracerOpCode::Create
                    } else {
                        libevm_interop::TracerOpCode::Call
                    },
                    from: p.from,
                    to: p.to,
                    input: p.input,
                    gas: p.gas,
                    value: p.value,
                };
                self.tracers.get(p.tracer_handle)?.lock().capture_start(frame);
                unit()
            }
            "TracerCaptureEnd" => {
                let p: TracerEndParams = parse(args)?;
                self.tracers
                    .get(p.tracer_handle)?
                    .lock()
                    .capture_end(p.output, p.gas_used, p.duration, p.err);
                unit()
            }
            "TracerCaptureEnter" => {
                let p: TracerEnterParams = parse(args)?;
                let frame = FrameStart {
                    op_code: p.op_code,
                    from: p.from,
                    to: p.to,
                    input: p.input,
                    gas: p.gas,
                    value: p.value,
                };
                self.tracers.get(p.tracer_handle)?.lock().capture_enter(frame);
                unit()
            }
            "TracerCaptureExit" => {
                let p: TracerExitParams = parse(args)?;
                self.tracers
                    .get(p.tracer_handle)?
                    .lock()
                    .capture_exit(p.output, p.gas_used, p.err);
                unit()
            }

            // ── Diagnostics ──
            "CallbackInvoke" => {
                let p: CallbackInvokeParams = parse(args)?;
                reply(host_bridge::invoke(p.handle, &p.args, p.expect_result)?)
            }

            other => Err(StubError::MethodNotFound(other.to_string())),
        }
    }
}

fn parse<P: DeserializeOwned>(args: Option<&str>) -> StubResult<P> {
    let args = args.ok_or_else(|| StubError::InvalidArguments("missing arguments".into()))?;
    serde_json::from_str(args).map_err(|e| StubError::InvalidArguments(e.to_string()))
}

fn no_args(args: Option<&str>) -> StubResult<()> {
    match args {
        Some(args) if !args.trim().is_empty() => {
            Err(StubError::InvalidArguments("method takes no arguments".into()))
        }
        _ => Ok(()),
    }
}

fn reply<T: Serialize>(value: T) -> StubResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn unit() -> StubResult<Value> {
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libevm_interop::{decode_envelope, Hash};

    fn call<R: DeserializeOwned>(
        service: &Service,
        method: &str,
        args: Option<&str>,
    ) -> Result<R, String> {
        decode_envelope(&service.invoke(method, args)).unwrap()
    }

    #[test]
    fn test_method_not_found() {
        let service = Service::default();
        let err = call::<Value>(&service, "Nope", None).unwrap_err();
        assert_eq!(err, "method not found: Nope");
    }

    #[test]
    fn test_argument_checks() {
        let service = Service::default();
        let err = call::<Handle>(&service, "DatabaseOpenMemoryDB", Some("{}")).unwrap_err();
        assert!(err.starts_with("invalid arguments"));
        let err = call::<Hash>(&service, "StateCommit", None).unwrap_err();
        assert!(err.starts_with("invalid arguments"));
        let err = call::<Hash>(&service, "StateCommit", Some(r#"{"handle":"x"}"#)).unwrap_err();
        assert!(err.starts_with("invalid arguments"));
    }

    #[test]
    fn test_open_commit_close() {
        let service = Service::default();
        let db: Handle = call(&service, "DatabaseOpenMemoryDB", None).unwrap();
        assert_eq!(db, 1);
        let args = format!(r#"{{"databaseHandle":{},"root":"{}"}}"#, db, Hash::ZERO);
        let state: Handle = call(&service, "StateOpen", Some(&args)).unwrap();
        let handle = format!(r#"{{"handle":{}}}"#, state);
        let root: Hash = call(&service, "StateCommit", Some(&handle)).unwrap();
        assert_eq!(root, Hash::ZERO);

        call::<Value>(&service, "StateClose", Some(&handle)).unwrap();
        let err = call::<Hash>(&service, "StateCommit", Some(&handle)).unwrap_err();
        assert_eq!(err, format!("invalid handle: {}", state));
        let err = call::<Value>(&service, "StateClose", Some(&handle)).unwrap_err();
        assert_eq!(err, format!("invalid handle: {}", state));
    }

    #[test]
    fn test_unknown_tracer() {
        let service = Service::default();
        let args = r#"{"tracer":"bogus"}"#;
        let err = call::<Handle>(&service, "TracerCreate", Some(args)).unwrap_err();
        assert_eq!(err, "tracer not found: bogus");
    }
}
