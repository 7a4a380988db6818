//! Test utilities for c2wasm-lib.
//!
//! Shell helpers plus a fake toolchain made of small `/bin/sh` scripts that
//! behave enough like the real tools for the pipelines to run end to end.
//! Tests that install or rewrite scripts must run `#[serial]`: a script
//! still open for writing in one thread cannot be executed by another.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::toolchain::Toolchain;

/// Returns the shell command and args to execute a shell script.
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

/// Write an executable script to `path`.
pub fn write_script(path: &Path, body: &str) -> io::Result<()> {
  std::fs::write(path, body)?;
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

/// A script that prints `message` to stderr and exits 1.
pub fn failing_script(message: &str) -> String {
  format!("#!/bin/sh\necho '{message}' >&2\nexit 1\n")
}

// Sets $out to the argument following -o and $last to the final argument.
const PARSE_OUT: &str = r#"out=""
prev=""
last=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
  last="$arg"
done
"#;

const COMPILER: &str = r#"echo "clang $*"
for arg in "$@"; do
  case "$arg" in
    *.c)
      if grep -q '#error' "$arg"; then
        echo "$arg:1:2: error: forced failure" >&2
        exit 1
      fi
      ;;
  esac
done
printf '\000asm\001\000\000\000' > "$out"
"#;

const OPTIMIZER: &str = r#"cp "$last" "$out"
"#;

const CHECKER: &str = r#"test -f "$1"
"#;

const BYTECODE_COMPILER: &str = r#"cat > "$out" <<'GEN'
/* File generated automatically by the QuickJS compiler. */

#include <inttypes.h>

const uint32_t qjsc_hook_size = 3;

const uint8_t qjsc_hook[3] = {
 0x43, 0x02, 0xff,
};

GEN
"#;

/// A toolchain whose every tool is a script in one directory.
#[derive(Debug, Clone)]
pub struct FakeToolchain {
  pub toolchain: Toolchain,
}

impl FakeToolchain {
  /// What the fake compiler writes, unchanged by the fake optimizer.
  pub const WASM_BYTES: &'static [u8] = b"\0asm\x01\0\0\0";
  /// The array the fake bytecode compiler embeds.
  pub const BYTECODE_BYTES: &'static [u8] = &[0x43, 0x02, 0xff];

  /// Install the scripts under `dir`, creating it.
  pub fn install(dir: &Path) -> io::Result<Self> {
    std::fs::create_dir_all(dir)?;
    let include_dir = dir.join("includes");
    std::fs::create_dir_all(&include_dir)?;

    let toolchain = Toolchain {
      compiler: dir.join("clang"),
      sysroot: dir.join("sysroot"),
      default_include_dir: include_dir,
      optimizer: dir.join("wasm-opt"),
      cleaner: dir.join("hook-cleaner"),
      guard_checker: dir.join("guard_checker"),
      bytecode_compiler: dir.join("qjsc"),
    };

    let script = |body: &str| format!("#!/bin/sh\n{PARSE_OUT}{body}");
    write_script(&toolchain.compiler, &script(COMPILER))?;
    write_script(&toolchain.optimizer, &script(OPTIMIZER))?;
    write_script(&toolchain.cleaner, &format!("#!/bin/sh\n{CHECKER}"))?;
    write_script(&toolchain.guard_checker, &format!("#!/bin/sh\n{CHECKER}"))?;
    write_script(&toolchain.bytecode_compiler, &script(BYTECODE_COMPILER))?;

    Ok(Self { toolchain })
  }
}
