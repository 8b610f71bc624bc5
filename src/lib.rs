//! FasterBASIC compiler back end core.
//!
//! A launch-time compiler for the FasterBASIC dialect: source text is
//! lowered to native AArch64 machine code, linked in memory, and run
//! directly. This crate is the back end core plus the front half it is
//! contractually tied to:
//!
//! - **Encoder**: pure functions from typed operands to 32-bit AArch64
//!   instruction words, bit-exact to the architecture reference
//! - **Lexer / Parser / AST**: recursive descent with error recovery,
//!   a forward-reference prescan, and a pretty-printer
//! - **JitModule**: the append-only code buffer and side tables the
//!   code generator fills (labels, symbols, extern calls, source map)
//! - **Linker**: trampoline island allocation and branch patching into
//!   a caller-provided executable region
//! - **Disassembler / Verifier**: capstone-backed annotated listings,
//!   instruction classification, and an assembler round-trip harness
//!
//! # Example
//!
//! ```rust
//! use fasterbasic::encoder::{emit_add_register_64, reg_only, Reg};
//! use fasterbasic::parser;
//!
//! // The encoder is a pure function library.
//! assert_eq!(
//!     emit_add_register_64(Reg::X0, Reg::X1, reg_only(Reg::X2)),
//!     0x8B020020,
//! );
//!
//! // The parser keeps going past errors and reports all of them.
//! let outcome = parser::parse_source("PRINT 2 + 3 * 4").unwrap();
//! assert!(outcome.is_clean());
//! ```
//!
//! # Pipeline
//!
//! ```text
//! source text
//!     |            lexer
//!     v
//!   tokens
//!     |            parser (prescan + recursive descent)
//!     v
//!    AST
//!     |            codegen (external collaborator)
//!     v
//! JitModule  --->  linker  --->  executable region + LinkResult
//!     |                               |
//!     +------- disassembler <--------+
//! ```

#![warn(clippy::all)]

pub mod ast;
pub mod ast_printer;
pub mod disasm;
pub mod encoder;
pub mod jit;
pub mod lexer;
pub mod linker;
pub mod module;
pub mod parser;
pub mod token;
pub mod verify;

// Re-export commonly used types
pub use ast::{Expr, ExprKind, Program, SourceLoc, Stmt, StmtKind};
pub use disasm::{classify_mnemonic, ClassCounts, DisasmError, Disassembler, InsnClass};
pub use encoder::{Arrangement, BranchClass, BranchFixup, Cond, Operand2, Reg, VReg};
pub use jit::{CodeRegion, JitError};
pub use lexer::{tokenize, LexError};
pub use linker::{link, LinkError, LinkRegion, LinkResult, TrampolineStub, STUB_SIZE};
pub use module::{ExtCall, JitModule, ModuleError, Symbol};
pub use parser::{parse, parse_source, ParseError, ParseOutcome};
pub use token::{Keyword, Token, TokenKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use encoder::{emit_ret, reg_only};

    #[test]
    fn test_emit_parse_link_round() {
        // Smallest end-to-end: parse a program, hand-emit a module the
        // way codegen would, link it, and check the stub table.
        let outcome = parse_source("PRINT 42").unwrap();
        assert!(outcome.is_clean());

        let mut module = JitModule::new();
        module.define_symbol("basic_main", true).unwrap();
        module
            .emit_all(&encoder::emit_load_immediate_64(Reg::X0, 42))
            .unwrap();
        module.emit_ext_call("basic_print_int").unwrap();
        module.emit(emit_ret()).unwrap();
        module.seal();

        let mut code = vec![0u8; module.code().len()];
        let mut stubs = vec![0u8; STUB_SIZE];
        let mut region = LinkRegion {
            code: &mut code,
            trampolines: &mut stubs,
            code_base_addr: 0x4000,
            trampoline_base_addr: 0x8000,
        };
        let result = link(&module, |_| Some(0xDEAD_0000), &mut region).unwrap();
        assert_eq!(result.trampoline_stubs.len(), 1);
        assert_eq!(result.trampoline_stubs[0].name, "basic_print_int");
    }

    #[test]
    fn test_reexports_are_usable() {
        let word = encoder::emit_add_register_64(Reg::X0, Reg::X1, reg_only(Reg::X2));
        assert_eq!(word, 0x8B020020);
        assert!(!VERSION.is_empty());
    }
}
