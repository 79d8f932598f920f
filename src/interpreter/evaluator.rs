/// Core evaluation logic and context management.
///
/// Contains the runtime context, the expression dispatch, control-flow
/// reporting and the frame guard used by calls and comprehensions.
pub mod core;

/// Evaluation frames and variable binding resolution.
///
/// Implements the binding modes (`Local`, `LocalOnly`, `Exist`, `NonExist`,
/// `Query`, `Global`, `NonLocal`) over a stack of frames sharing bindings by
/// reference count.
pub mod frame;

/// The callable sandbox and the call disabler.
pub mod security;

/// Utility functions for evaluation.
///
/// Provides ordering, membership, index normalization and integer division
/// helpers shared by the operators, built-ins and aggregates.
pub mod utils;

/// Binary operator evaluation logic.
///
/// Handles arithmetic over numbers, quantities, strings, sequences and
/// geometry values, printf-style formatting, and comparisons.
pub mod binary;

/// Unary operator evaluation logic.
///
/// Implements negation, unary plus and logical `not`.
pub mod unary;

/// Trailing components: attribute, index and slice access.
pub mod component;

/// Identifier and cell range reads.
pub mod variable;

/// Plain, compound and unpacking assignment.
pub mod assign;

/// Statement execution: blocks, conditionals, loops, `try`, jumps,
/// definitions, deletion, scope declarations and imports.
pub mod statement;

/// Evaluation of for-loop statements.
///
/// Iterates a value, binds the loop targets and runs the body with
/// `break`/`continue`/`else` handling and cancellation polling.
pub mod for_loop;

/// List, tuple, set and dict displays and comprehensions.
pub mod collection;

/// Built-in names, the `math` module and methods of built-in values.
pub mod builtins;

/// Function evaluation.
///
/// Handles catalog functions, user-defined functions and host callables,
/// argument binding and return value computation.
pub mod function;
