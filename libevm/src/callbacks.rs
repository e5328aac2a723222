//! Typed callbacks with documented fallbacks.
//!
//! Each typed callback decodes its arguments, runs a user provider and
//! encodes the result. Provider failures never cross the boundary as
//! panics or errors; they become the fallback of the callback kind:
//!
//! - [`BlockHashCallback`]: the zero hash
//! - [`InvocationCallback`]: no result, which fails the external call natively

use libevm_interop::codec::{self, HexBig};
use libevm_interop::{ExternalInvocation, Hash, InvocationResult};
use num_bigint::BigUint;
use serde::Serialize;
use tracing::{error, warn};

use crate::callback::LibEvmCallback;

/// Answers block-hash lookups for the executing block context.
pub trait BlockHashProvider: Send + Sync {
    fn block_hash(&self, block_number: &BigUint) -> anyhow::Result<Hash>;
}

impl<F> BlockHashProvider for F
where
    F: Fn(&BigUint) -> anyhow::Result<Hash> + Send + Sync,
{
    fn block_hash(&self, block_number: &BigUint) -> anyhow::Result<Hash> {
        self(block_number)
    }
}

/// Executes calls to contracts the native engine delegates to the host.
pub trait ExternalCallHandler: Send + Sync {
    fn execute(&self, invocation: ExternalInvocation) -> anyhow::Result<InvocationResult>;
}

impl<F> ExternalCallHandler for F
where
    F: Fn(ExternalInvocation) -> anyhow::Result<InvocationResult> + Send + Sync,
{
    fn execute(&self, invocation: ExternalInvocation) -> anyhow::Result<InvocationResult> {
        self(invocation)
    }
}

/// Block-hash callback. Argument: block number as a hex quantity.
/// Result: the 32-byte hash.
pub struct BlockHashCallback<P> {
    provider: P,
}

impl<P: BlockHashProvider> BlockHashCallback<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn resolve(&self, args: &str) -> anyhow::Result<Hash> {
        let HexBig(number) = codec::from_json(args)?;
        self.provider.block_hash(&number)
    }
}

impl<P: BlockHashProvider> LibEvmCallback for BlockHashCallback<P> {
    fn invoke(&self, args: &str) -> Option<String> {
        let hash = self.resolve(args).unwrap_or_else(|e| {
            warn!(error = %e, args, "block hash lookup failed, answering zero hash");
            Hash::ZERO
        });
        encode_result(&hash)
    }
}

/// External-call callback. Argument: an [`ExternalInvocation`].
/// Result: its [`InvocationResult`].
pub struct InvocationCallback<H> {
    handler: H,
}

impl<H: ExternalCallHandler> InvocationCallback<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    fn run(&self, args: &str) -> anyhow::Result<InvocationResult> {
        let invocation: ExternalInvocation = codec::from_json(args)?;
        self.handler.execute(invocation)
    }
}

impl<H: ExternalCallHandler> LibEvmCallback for InvocationCallback<H> {
    fn invoke(&self, args: &str) -> Option<String> {
        match self.run(args) {
            Ok(result) => encode_result(&result),
            Err(e) => {
                error!(error = %e, "external invocation failed");
                None
            }
        }
    }
}

fn encode_result<T: Serialize>(value: &T) -> Option<String> {
    codec::to_json(value)
        .map_err(|e| error!(error = %e, "failed to encode callback result"))
        .ok()
}
