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

//! Initial user stack layout. From the stack top downward: the argument
//! strings in reverse, zero padding to an 8-byte boundary, a null argv
//! sentinel, the argv pointers, and a null return address on top. On
//! entry rdi carries argc and rsi the address of argv[0].

use crate::{
    config::{PAGE_SIZE, USER_STACK, USER_STACK_PAGE},
    error::{code, Error},
};
use alloc::{string::String, sync::Arc, vec::Vec};
use teal_platform::{UserFrame, VmSpace};

pub(crate) fn build(
    vm: &Arc<dyn VmSpace>,
    argv: &[String],
    frame: &mut UserFrame,
) -> Result<(), Error> {
    if !vm.map_page(USER_STACK_PAGE, true) {
        return Err(code::ENOMEM);
    }
    let floor = USER_STACK - PAGE_SIZE;
    let mut rsp = USER_STACK;
    let mut push = |rsp: &mut u64, bytes: &[u8]| -> Result<(), Error> {
        if *rsp < floor + bytes.len() as u64 {
            return Err(code::ENOMEM);
        }
        *rsp -= bytes.len() as u64;
        if !vm.write_bytes(*rsp, bytes) {
            return Err(code::EFAULT);
        }
        Ok(())
    };

    // Strings, last argument first; remember where each lands.
    let mut string_addrs = Vec::with_capacity(argv.len());
    for arg in argv.iter().rev() {
        let mut bytes = arg.as_bytes().to_vec();
        bytes.push(0);
        push(&mut rsp, &bytes)?;
        string_addrs.push(rsp);
    }

    while rsp % 8 != 0 {
        push(&mut rsp, &[0])?;
    }

    // argv[argc] sentinel, then the pointers, argv[argc-1] first so
    // argv[0] ends up at the lowest address.
    push(&mut rsp, &0u64.to_le_bytes())?;
    for addr in string_addrs.iter() {
        push(&mut rsp, &addr.to_le_bytes())?;
    }

    frame.rdi = argv.len() as u64;
    frame.rsi = rsp;

    // Fake return address.
    push(&mut rsp, &0u64.to_le_bytes())?;
    frame.rsp = rsp;
    Ok(())
}
