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

#![allow(dead_code)]

use core::{num::TryFromIntError, str::Utf8Error};

pub mod code {
    pub const EOK: super::Error = super::Error(0);
    pub const EPERM: super::Error = super::Error(-1);
    pub const ENOENT: super::Error = super::Error(-2);
    pub const ENOEXEC: super::Error = super::Error(-8);
    pub const EBADF: super::Error = super::Error(-9);
    pub const ECHILD: super::Error = super::Error(-10);
    pub const ENOMEM: super::Error = super::Error(-12);
    pub const EFAULT: super::Error = super::Error(-14);
    pub const EBUSY: super::Error = super::Error(-16);
    pub const EEXIST: super::Error = super::Error(-17);
    pub const EINVAL: super::Error = super::Error(-22);
    pub const ENOSPC: super::Error = super::Error(-28);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Error(i32);

impl Error {
    pub fn from_errno(errno: i32) -> Error {
        Error(errno)
    }

    pub fn to_errno(self) -> i32 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        match *self {
            code::EOK => "OK",
            code::EPERM => "Operation not permitted",
            code::ENOENT => "No such file or directory",
            code::ENOEXEC => "Exec format error",
            code::EBADF => "Bad file descriptor",
            code::ECHILD => "No child process",
            code::ENOMEM => "Cannot allocate memory",
            code::EFAULT => "Bad address",
            code::EBUSY => "Device or resource busy",
            code::EEXIST => "File exists",
            code::EINVAL => "Invalid argument",
            code::ENOSPC => "No space left on device",
            _ => "Unknown error",
        }
    }
}

impl From<TryFromIntError> for Error {
    fn from(_: TryFromIntError) -> Error {
        code::EINVAL
    }
}

impl From<Utf8Error> for Error {
    fn from(_: Utf8Error) -> Error {
        code::EINVAL
    }
}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Error {
        code::EINVAL
    }
}

impl From<core::convert::Infallible> for Error {
    fn from(e: core::convert::Infallible) -> Error {
        match e {}
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Error({}): {}", self.0, self.name())
    }
}
