/*
 * Architecture Abstraction Layer
 *
 * The kernel core talks to the machine only through this module: a
 * critical-section primitive and a context-switch primitive. Everything
 * else (the scheduler, the service gateway, the tick engine) is
 * architecture-independent.
 *
 * Only x86_64 is implemented; other targets fail to build here rather than
 * link a broken or stubbed-out primitive.
 */

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(not(target_arch = "x86_64"))]
compile_error!("chronorr's context-switch primitive is only implemented for x86_64");

#[cfg(target_arch = "x86_64")]
pub use self::x86_64::context;
#[cfg(target_arch = "x86_64")]
pub use self::x86_64::critical;
