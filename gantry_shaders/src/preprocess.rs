// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::BTreeSet;

use crate::ShaderError;

struct StackItem {
    active: bool,
    else_passed: bool,
}

/// Resolve `#ifdef`, `#ifndef`, `#else` and `#endif` directives against `defines`.
///
/// Directives must be the first non-whitespace item on their line. Unbalanced
/// conditionals are an error, since a variant built from them would silently
/// include or drop code.
pub fn preprocess(
    input: &str,
    shader_name: &str,
    defines: &BTreeSet<&'static str>,
) -> Result<String, ShaderError> {
    let mut output = String::with_capacity(input.len());
    let mut stack: Vec<StackItem> = vec![];
    for (line_number, line) in input.lines().enumerate() {
        let trimmed = line.trim_start();
        let Some(directive_start) = trimmed.strip_prefix('#') else {
            if line.contains('#') && !line.trim_start().starts_with("//") {
                log::warn!(
                    "Preprocessor directives must be the first non-whitespace item on their \
                     line, passing through (line {line_number} of {shader_name}.wgsl)"
                );
            }
            if stack.iter().all(|item| item.active) {
                output.push_str(line);
                output.push('\n');
            }
            continue;
        };
        let directive_len = directive_start
            // The first character which can't be part of the directive name marks its end
            .find(|c: char| !(c == '_' || c.is_alphanumeric()))
            .unwrap_or(directive_start.len());
        let directive = &directive_start[..directive_len];
        let remainder = directive_start[directive_len..].trim();
        match directive {
            def_test @ ("ifdef" | "ifndef") => {
                if remainder.is_empty() {
                    return Err(ShaderError::Preprocess {
                        line: line_number,
                        message: format!("#{def_test} needs an argument"),
                    });
                }
                let exists = defines.contains(remainder);
                stack.push(StackItem {
                    active: (def_test == "ifdef") == exists,
                    else_passed: false,
                });
            }
            "else" => {
                let Some(item) = stack.last_mut() else {
                    return Err(ShaderError::Preprocess {
                        line: line_number,
                        message: "#else without a matching #ifdef".into(),
                    });
                };
                if item.else_passed {
                    return Err(ShaderError::Preprocess {
                        line: line_number,
                        message: "second #else for the same conditional".into(),
                    });
                }
                item.else_passed = true;
                item.active = !item.active;
                if !remainder.is_empty() && !remainder.starts_with("//") {
                    log::warn!(
                        "#else directives don't take an argument. `{remainder}` will not \
                         be in output (line {line_number} of {shader_name}.wgsl)"
                    );
                }
            }
            "endif" => {
                if stack.pop().is_none() {
                    return Err(ShaderError::Preprocess {
                        line: line_number,
                        message: "mismatched #endif".into(),
                    });
                }
                if !remainder.is_empty() && !remainder.starts_with("//") {
                    log::warn!(
                        "#endif directives don't take an argument. `{remainder}` will \
                         not be in output (line {line_number} of {shader_name}.wgsl)"
                    );
                }
            }
            val => {
                return Err(ShaderError::Preprocess {
                    line: line_number,
                    message: format!("unknown preprocessor directive `#{val}`"),
                });
            }
        }
    }
    if !stack.is_empty() {
        return Err(ShaderError::Preprocess {
            line: input.lines().count(),
            message: format!("{} unterminated conditional(s)", stack.len()),
        });
    }
    Ok(output)
}
