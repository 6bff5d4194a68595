/*
 * x86_64 Architecture Support Module
 *
 * This module contains all x86_64-specific code for the kernel. It provides
 * the low-level architecture support needed for proper kernel operation on
 * x86_64 processors.
 *
 * Why this is important:
 * - Encapsulates all architecture-specific functionality
 * - Provides clean separation between generic kernel code and x86_64 specifics
 * - Enables potential porting to other architectures in the future
 *
 * Submodules:
 * - critical: interrupt enable/disable and critical-section helpers
 * - context: stack initialization and the callee-saved-register switch
 * - timer: optional legacy PIT tick source (feature `pit-timer`)
 */

pub mod critical;
pub mod context;

#[cfg(feature = "pit-timer")]
pub mod timer;
