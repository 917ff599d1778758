//! The builtin-name whitelist used by the hallucination detector.

use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    /// Python builtins plus the conventional receiver names and the dunder
    /// globals that resolve in any module. A name on this list is never a
    /// hallucination, regardless of code context.
    static ref PYTHON_BUILTINS: HashSet<&'static str> = [
        // Functions
        "abs", "all", "any", "ascii", "bin", "bool", "bytearray", "bytes",
        "callable", "chr", "classmethod", "compile", "complex", "delattr",
        "dict", "dir", "divmod", "enumerate", "eval", "exec", "filter",
        "float", "format", "frozenset", "getattr", "globals", "hasattr",
        "hash", "help", "hex", "id", "input", "int", "isinstance",
        "issubclass", "iter", "len", "list", "locals", "map", "max", "min",
        "next", "object", "oct", "open", "ord", "pow", "print", "property",
        "range", "repr", "reversed", "round", "set", "setattr", "slice",
        "sorted", "staticmethod", "str", "sum", "super", "tuple", "type",
        "vars", "zip",
        // Singletons and keyword-like names
        "True", "False", "None", "NotImplemented", "Ellipsis",
        // Common exception types
        "BaseException", "Exception", "ArithmeticError", "AssertionError",
        "AttributeError", "EOFError", "FileNotFoundError", "ImportError",
        "IndexError", "KeyError", "KeyboardInterrupt", "LookupError",
        "NameError", "NotImplementedError", "OSError", "OverflowError",
        "RecursionError", "RuntimeError", "StopIteration", "SyntaxError",
        "TypeError", "ValueError", "ZeroDivisionError", "Warning",
        // Conventional receivers and module globals
        "self", "cls", "__name__", "__file__", "__doc__", "__main__",
    ]
    .into_iter()
    .collect();
}

/// True when `name` is a Python builtin, singleton, standard exception, or
/// conventional receiver.
pub fn is_python_builtin(name: &str) -> bool {
    PYTHON_BUILTINS.contains(name)
}
