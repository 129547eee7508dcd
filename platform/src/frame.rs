// Copyright (c) 2025 vivo Mobile Communication Co., Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// User-mode code segment selector.
pub const SEL_UCSEG: u16 = 0x33;
/// User-mode data/stack segment selector.
pub const SEL_UDSEG: u16 = 0x2b;

/// RFLAGS with the interrupt flag set; user code always runs with
/// interrupts enabled.
pub const FLAG_IF: u64 = 0x202;

/// Register state handed to user mode on entry and captured again at the
/// syscall boundary. Layout follows the x86-64 general purpose set plus
/// the iret frame tail.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct UserFrame {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl UserFrame {
    /// Frame for the first entry into a freshly loaded program. The
    /// loader fills rip/rsp/rdi/rsi afterwards.
    pub const fn user_entry() -> Self {
        Self {
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rsi: 0,
            rdi: 0,
            rbp: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rip: 0,
            cs: SEL_UCSEG as u64,
            rflags: FLAG_IF,
            rsp: 0,
            ss: SEL_UDSEG as u64,
        }
    }
}

impl Default for UserFrame {
    fn default() -> Self {
        Self::user_entry()
    }
}
