// src/provider/flags.rs

//! Compiler flag normalization: language standard, target architecture,
//! IntelliSense mode, and preprocessor definitions.
//!
//! Everything here is pure; the provider feeds it the tokenized argument
//! list of one compile command plus the negotiated host capabilities.

use std::path::Path;

use serde::Serializer;

use crate::provider::host::HostCapabilities;

/// Language standards the host understands, GNU dialects included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum LanguageStandard {
    C89,
    C99,
    C11,
    C17,
    Gnu89,
    Gnu99,
    Gnu11,
    Gnu17,
    Cpp98,
    Cpp03,
    Cpp11,
    Cpp14,
    Cpp17,
    Cpp20,
    Cpp23,
    GnuCpp98,
    GnuCpp03,
    GnuCpp11,
    GnuCpp14,
    GnuCpp17,
    GnuCpp20,
    GnuCpp23,
}

impl LanguageStandard {
    /// Parse the value part of a `-std=`/`/std:` flag, accepting the usual
    /// draft-era aliases (`c++0x`, `c++2a`, `c1x`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        use LanguageStandard::*;
        let std = match value {
            "c89" | "c90" | "iso9899:1990" => C89,
            "c99" | "iso9899:1999" => C99,
            "c11" | "c1x" => C11,
            "c17" | "c18" | "iso9899:2017" => C17,
            "gnu89" | "gnu90" => Gnu89,
            "gnu99" => Gnu99,
            "gnu11" | "gnu1x" => Gnu11,
            "gnu17" | "gnu18" => Gnu17,
            "c++98" => Cpp98,
            "c++03" => Cpp03,
            "c++11" | "c++0x" => Cpp11,
            "c++14" | "c++1y" => Cpp14,
            "c++17" | "c++1z" => Cpp17,
            "c++20" | "c++2a" => Cpp20,
            "c++23" | "c++2b" => Cpp23,
            "gnu++98" => GnuCpp98,
            "gnu++03" => GnuCpp03,
            "gnu++11" | "gnu++0x" => GnuCpp11,
            "gnu++14" | "gnu++1y" => GnuCpp14,
            "gnu++17" | "gnu++1z" => GnuCpp17,
            "gnu++20" | "gnu++2a" => GnuCpp20,
            "gnu++23" | "gnu++2b" => GnuCpp23,
            _ => return None,
        };
        Some(std)
    }

    pub fn as_str(&self) -> &'static str {
        use LanguageStandard::*;
        match self {
            C89 => "c89",
            C99 => "c99",
            C11 => "c11",
            C17 => "c17",
            Gnu89 => "gnu89",
            Gnu99 => "gnu99",
            Gnu11 => "gnu11",
            Gnu17 => "gnu17",
            Cpp98 => "c++98",
            Cpp03 => "c++03",
            Cpp11 => "c++11",
            Cpp14 => "c++14",
            Cpp17 => "c++17",
            Cpp20 => "c++20",
            Cpp23 => "c++23",
            GnuCpp98 => "gnu++98",
            GnuCpp03 => "gnu++03",
            GnuCpp11 => "gnu++11",
            GnuCpp14 => "gnu++14",
            GnuCpp17 => "gnu++17",
            GnuCpp20 => "gnu++20",
            GnuCpp23 => "gnu++23",
        }
    }

    /// ISO equivalent of a GNU dialect; identity for ISO standards.
    pub fn without_gnu(self) -> Self {
        use LanguageStandard::*;
        match self {
            Gnu89 => C89,
            Gnu99 => C99,
            Gnu11 => C11,
            Gnu17 => C17,
            GnuCpp98 => Cpp98,
            GnuCpp03 => Cpp03,
            GnuCpp11 => Cpp11,
            GnuCpp14 => Cpp14,
            GnuCpp17 => Cpp17,
            GnuCpp20 => Cpp20,
            GnuCpp23 => Cpp23,
            other => other,
        }
    }

    /// Demote dialects newer than what the host knows to the next supported
    /// one, and strip GNU prefixes the host does not accept.
    pub fn for_capabilities(self, caps: &HostCapabilities) -> Self {
        use LanguageStandard::*;
        let mut std = self;
        if !caps.supports_cpp23 {
            std = match std {
                Cpp23 => Cpp20,
                GnuCpp23 => GnuCpp20,
                other => other,
            };
        }
        if !caps.supports_gnu_standards {
            std = std.without_gnu();
        }
        std
    }
}

impl std::fmt::Display for LanguageStandard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for LanguageStandard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Target architectures the host's IntelliSense modes distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArch {
    X86,
    X64,
    Arm,
    Arm64,
}

impl TargetArch {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetArch::X86 => "x86",
            TargetArch::X64 => "x64",
            TargetArch::Arm => "arm",
            TargetArch::Arm64 => "arm64",
        }
    }

    /// Map an architecture or triple name to a known target.
    ///
    /// `aarch64` is checked before the generic `arm` substring because
    /// triples like `aarch64-arm-none-eabi` contain both; ARMv7 and earlier
    /// collapse to plain `arm`.
    fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.contains("aarch64") || name.contains("arm64") || name.contains("armv8") {
            Some(TargetArch::Arm64)
        } else if name.contains("arm") {
            Some(TargetArch::Arm)
        } else if name.contains("x86_64") || name.contains("x86-64") || name.contains("amd64") {
            Some(TargetArch::X64)
        } else if name.contains("i386")
            || name.contains("i486")
            || name.contains("i586")
            || name.contains("i686")
            || name.contains("x86")
        {
            Some(TargetArch::X86)
        } else {
            None
        }
    }
}

impl std::fmt::Display for TargetArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiler families the host's IntelliSense modes distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerKind {
    Msvc,
    Clang,
    Gcc,
}

impl CompilerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerKind::Msvc => "msvc",
            CompilerKind::Clang => "clang",
            CompilerKind::Gcc => "gcc",
        }
    }
}

/// One of the enumerated `{msvc,clang,gcc}-{x86,x64,arm,arm64}` modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntelliSenseMode {
    pub kind: CompilerKind,
    pub arch: TargetArch,
}

impl std::fmt::Display for IntelliSenseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.kind.as_str(), self.arch.as_str())
    }
}

impl serde::Serialize for IntelliSenseMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Flatten an argument vector whose elements may each contain several
/// shell-quoted tokens. Elements that fail to tokenize are kept verbatim.
pub fn retokenize(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match shell_words::split(arg) {
            Ok(tokens) if !tokens.is_empty() => out.extend(tokens),
            _ => out.push(arg.clone()),
        }
    }
    out
}

/// Extract the language standard from the flags, version-gated.
///
/// Returns `None` when the host deduces the standard itself, when no
/// standard flag is present, or when the dialect is unknown. The last
/// standard flag wins, matching compiler behavior.
pub fn parse_standard(flags: &[String], caps: &HostCapabilities) -> Option<LanguageStandard> {
    if !caps.requires_standard_hint {
        return None;
    }

    let mut found = None;
    for flag in flags {
        let value = flag
            .strip_prefix("-std=")
            .or_else(|| flag.strip_prefix("-std:"))
            .or_else(|| flag.strip_prefix("/std:"));
        if let Some(value) = value {
            if value == "c++latest" {
                found = Some(if caps.supports_cpp23 {
                    LanguageStandard::Cpp23
                } else {
                    LanguageStandard::Cpp20
                });
            } else if let Some(std) = LanguageStandard::parse(value) {
                found = Some(std);
            }
        }
    }

    found.map(|std| std.for_capabilities(caps))
}

/// Extract an explicit target architecture from the flags, if any.
pub fn parse_target_arch(flags: &[String]) -> Option<TargetArch> {
    let mut iter = flags.iter().peekable();
    let mut found = None;

    while let Some(flag) = iter.next() {
        let arch = match flag.as_str() {
            "-m32" => Some(TargetArch::X86),
            "-m64" => Some(TargetArch::X64),
            "-arch" | "-target" | "--target" => iter
                .peek()
                .and_then(|value| TargetArch::from_name(value)),
            other => {
                if let Some(value) = other
                    .strip_prefix("-march=")
                    .or_else(|| other.strip_prefix("--target="))
                    .or_else(|| other.strip_prefix("-arch="))
                {
                    TargetArch::from_name(value)
                } else if let Some(value) = other.strip_prefix("/arch:") {
                    // MSVC /arch: only pins the architecture for the ARM
                    // variants; SSE/AVX levels say nothing about bitness.
                    match value {
                        "ARM64" | "ARM64EC" => Some(TargetArch::Arm64),
                        "ARMv7VE" | "VFPv4" => Some(TargetArch::Arm),
                        _ => None,
                    }
                } else {
                    None
                }
            }
        };
        if arch.is_some() {
            found = arch;
        }
    }

    found
}

/// Infer the IntelliSense mode from the compiler basename and the parsed
/// target architecture.
///
/// Skipped (left to the host) when the host no longer requires an
/// architecture hint and the flags pinned none.
pub fn infer_intellisense_mode(
    compiler: &Path,
    arch: Option<TargetArch>,
    caps: &HostCapabilities,
) -> Option<IntelliSenseMode> {
    if !caps.requires_architecture_hint && arch.is_none() {
        return None;
    }

    let name = compiler
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let kind = if name.contains("cl.exe") || name == "cl" {
        CompilerKind::Msvc
    } else if name.contains("clang") {
        CompilerKind::Clang
    } else if name.contains("gcc") || name.contains("g++") {
        CompilerKind::Gcc
    } else if cfg!(windows) {
        CompilerKind::Msvc
    } else if cfg!(target_os = "macos") {
        CompilerKind::Clang
    } else {
        CompilerKind::Gcc
    };

    let arch = arch
        .or_else(|| TargetArch::from_name(&name))
        .unwrap_or(TargetArch::X64);

    Some(IntelliSenseMode { kind, arch })
}

/// Collect `-D` / `/D` definitions, in both joined (`-DFOO=1`) and
/// separated (`-D FOO=1`) forms.
pub fn collect_defines(flags: &[String]) -> Vec<String> {
    let mut defines = Vec::new();
    let mut iter = flags.iter().peekable();

    while let Some(flag) = iter.next() {
        if flag == "-D" || flag == "/D" {
            if let Some(value) = iter.next() {
                defines.push(value.clone());
            }
        } else if let Some(value) = flag.strip_prefix("-D").or_else(|| flag.strip_prefix("/D")) {
            defines.push(value.to_string());
        }
    }

    defines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn flags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn standard_is_parsed_when_the_host_wants_a_hint() {
        let caps = HostCapabilities::from_version(4);
        let std = parse_standard(&flags(&["-std=gnu++17", "-O2"]), &caps);
        assert_eq!(std, Some(LanguageStandard::GnuCpp17));
    }

    #[test]
    fn standard_is_skipped_for_newer_hosts() {
        let caps = HostCapabilities::from_version(5);
        assert_eq!(parse_standard(&flags(&["-std=gnu++17"]), &caps), None);
    }

    #[test]
    fn gnu_dialects_are_demoted_for_old_hosts() {
        let caps = HostCapabilities::from_version(2);
        let std = parse_standard(&flags(&["-std=gnu++17"]), &caps);
        assert_eq!(std, Some(LanguageStandard::Cpp17));
    }

    #[test]
    fn cpp23_is_downgraded_when_unsupported() {
        let caps = HostCapabilities::from_version(4);
        let std = parse_standard(&flags(&["-std=c++23"]), &caps);
        assert_eq!(std, Some(LanguageStandard::Cpp20));
    }

    #[test]
    fn the_last_standard_flag_wins() {
        let caps = HostCapabilities::from_version(4);
        let std = parse_standard(&flags(&["-std=c++11", "-std=c++17"]), &caps);
        assert_eq!(std, Some(LanguageStandard::Cpp17));
    }

    #[test]
    fn msvc_style_standard_flags_are_recognized() {
        let caps = HostCapabilities::from_version(4);
        let std = parse_standard(&flags(&["/std:c++17"]), &caps);
        assert_eq!(std, Some(LanguageStandard::Cpp17));
        let latest = parse_standard(&flags(&["/std:c++latest"]), &caps);
        assert_eq!(latest, Some(LanguageStandard::Cpp20));
    }

    #[test]
    fn arch_flags() {
        assert_eq!(parse_target_arch(&flags(&["-m32"])), Some(TargetArch::X86));
        assert_eq!(parse_target_arch(&flags(&["-m64"])), Some(TargetArch::X64));
        assert_eq!(
            parse_target_arch(&flags(&["--target=aarch64-linux-gnu"])),
            Some(TargetArch::Arm64)
        );
        assert_eq!(
            parse_target_arch(&flags(&["-march=armv7-a"])),
            Some(TargetArch::Arm)
        );
        assert_eq!(
            parse_target_arch(&flags(&["-arch", "x86_64"])),
            Some(TargetArch::X64)
        );
        assert_eq!(parse_target_arch(&flags(&["/arch:AVX2"])), None);
        assert_eq!(
            parse_target_arch(&flags(&["/arch:ARM64"])),
            Some(TargetArch::Arm64)
        );
    }

    #[test]
    fn aarch64_wins_over_generic_arm_in_compiler_names() {
        let caps = HostCapabilities::from_version(4);
        let mode = infer_intellisense_mode(
            &PathBuf::from("/opt/cross/bin/aarch64-arm-none-eabi-gcc"),
            None,
            &caps,
        )
        .unwrap();
        assert_eq!(mode.to_string(), "gcc-arm64");
    }

    #[test]
    fn mode_inference_respects_capabilities() {
        let caps = HostCapabilities::from_version(5);
        // No explicit arch hint: the newer host infers the mode itself.
        assert_eq!(
            infer_intellisense_mode(&PathBuf::from("/usr/bin/clang++"), None, &caps),
            None
        );
        // An explicit hint is still forwarded.
        let mode =
            infer_intellisense_mode(&PathBuf::from("/usr/bin/clang++"), Some(TargetArch::X86), &caps)
                .unwrap();
        assert_eq!(mode.to_string(), "clang-x86");
    }

    #[test]
    fn defines_in_both_forms() {
        let defs = collect_defines(&flags(&["-DFOO", "-D", "BAR=1", "/DBAZ", "-O2"]));
        assert_eq!(defs, vec!["FOO", "BAR=1", "BAZ"]);
    }

    #[test]
    fn retokenize_splits_quoted_elements() {
        let toks = retokenize(&flags(&["-I /inc -O2", "-DNAME='a b'"]));
        assert_eq!(toks, vec!["-I", "/inc", "-O2", "-DNAME=a b"]);
    }
}
