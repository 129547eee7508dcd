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

//! ELF64 executable loader. Accepts static little-endian x86-64
//! executables only; PT_LOAD segments are mapped page-aligned into the
//! target address space with the tail zero-filled.

use crate::{
    config::{ELF_PHNUM_MAX, KERN_BASE, PAGE_MASK, PAGE_SIZE},
    error::{code, Error},
};
use alloc::sync::Arc;
use bitflags::bitflags;
use teal_platform::{File, VmSpace};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u8 = 1;
const ET_EXEC: u16 = 2;
const EM_X86_64: u16 = 0x3e;

const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;
const PT_INTERP: u32 = 3;
const PT_SHLIB: u32 = 5;

pub(crate) const EHDR_SIZE: usize = 64;
pub(crate) const PHDR_SIZE: usize = 56;

bitflags! {
    #[derive(Debug, Clone, Copy)]
    struct SegmentFlags: u32 {
        const X = 1;
        const W = 2;
        const R = 4;
    }
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(buf[at..at + 2].try_into().unwrap())
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

fn u64_at(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

struct Ehdr {
    ident: [u8; 16],
    etype: u16,
    machine: u16,
    version: u32,
    entry: u64,
    phoff: u64,
    phentsize: u16,
    phnum: u16,
}

impl Ehdr {
    fn parse(buf: &[u8; EHDR_SIZE]) -> Self {
        Self {
            ident: buf[..16].try_into().unwrap(),
            etype: u16_at(buf, 16),
            machine: u16_at(buf, 18),
            version: u32_at(buf, 20),
            entry: u64_at(buf, 24),
            phoff: u64_at(buf, 32),
            phentsize: u16_at(buf, 54),
            phnum: u16_at(buf, 56),
        }
    }
}

struct Phdr {
    ptype: u32,
    flags: u32,
    offset: u64,
    vaddr: u64,
    filesz: u64,
    memsz: u64,
}

impl Phdr {
    fn parse(buf: &[u8; PHDR_SIZE]) -> Self {
        Self {
            ptype: u32_at(buf, 0),
            flags: u32_at(buf, 4),
            offset: u64_at(buf, 8),
            vaddr: u64_at(buf, 16),
            filesz: u64_at(buf, 32),
            memsz: u64_at(buf, 40),
        }
    }
}

/// Load `image` into `vm` and return the entry point.
pub(crate) fn load(image: &Arc<dyn File>, vm: &Arc<dyn VmSpace>) -> Result<u64, Error> {
    let mut ehdr_buf = [0u8; EHDR_SIZE];
    if image.read_at(0, &mut ehdr_buf) != EHDR_SIZE {
        return Err(code::ENOEXEC);
    }
    let ehdr = Ehdr::parse(&ehdr_buf);
    if ehdr.ident[..4] != ELF_MAGIC
        || ehdr.ident[4] != ELFCLASS64
        || ehdr.ident[5] != ELFDATA2LSB
        || ehdr.ident[6] != EV_CURRENT
        || ehdr.etype != ET_EXEC
        || ehdr.machine != EM_X86_64
        || ehdr.version != 1
        || ehdr.phentsize as usize != PHDR_SIZE
        || ehdr.phnum > ELF_PHNUM_MAX
    {
        return Err(code::ENOEXEC);
    }
    if ehdr.entry < PAGE_SIZE || ehdr.entry >= KERN_BASE {
        return Err(code::ENOEXEC);
    }

    for i in 0..ehdr.phnum as u64 {
        let at = ehdr
            .phoff
            .checked_add(i * PHDR_SIZE as u64)
            .ok_or(code::ENOEXEC)?;
        let mut phdr_buf = [0u8; PHDR_SIZE];
        if image.read_at(at as usize, &mut phdr_buf) != PHDR_SIZE {
            return Err(code::ENOEXEC);
        }
        let phdr = Phdr::parse(&phdr_buf);
        match phdr.ptype {
            PT_DYNAMIC | PT_INTERP | PT_SHLIB => return Err(code::ENOEXEC),
            PT_LOAD => {
                validate_segment(&phdr, image)?;
                map_segment(&phdr, image, vm)?;
            }
            _ => {}
        }
    }
    Ok(ehdr.entry)
}

fn validate_segment(phdr: &Phdr, image: &Arc<dyn File>) -> Result<(), Error> {
    if phdr.offset & PAGE_MASK != phdr.vaddr & PAGE_MASK {
        return Err(code::ENOEXEC);
    }
    if phdr.offset > image.size() as u64 {
        return Err(code::ENOEXEC);
    }
    if phdr.memsz < phdr.filesz {
        return Err(code::ENOEXEC);
    }
    if phdr.memsz == 0 {
        return Ok(());
    }
    let end = phdr.vaddr.checked_add(phdr.memsz).ok_or(code::ENOEXEC)?;
    if end > KERN_BASE {
        return Err(code::ENOEXEC);
    }
    // The first page stays unmapped so null derefs fault.
    if phdr.vaddr < PAGE_SIZE {
        return Err(code::ENOEXEC);
    }
    Ok(())
}

fn map_segment(phdr: &Phdr, image: &Arc<dyn File>, vm: &Arc<dyn VmSpace>) -> Result<(), Error> {
    if phdr.memsz == 0 {
        return Ok(());
    }
    let writable = SegmentFlags::from_bits_truncate(phdr.flags).contains(SegmentFlags::W);
    let file_page = phdr.offset & !PAGE_MASK;
    let mem_page = phdr.vaddr & !PAGE_MASK;
    let lead = (phdr.vaddr & PAGE_MASK) as usize;
    let mut read_left = lead + phdr.filesz as usize;
    let total = lead + phdr.memsz as usize;
    let pages = total.div_ceil(PAGE_SIZE as usize);
    let mut chunk_buf = alloc::vec![0u8; PAGE_SIZE as usize];
    for n in 0..pages {
        let upage = mem_page + (n as u64) * PAGE_SIZE;
        if !vm.map_page(upage, writable) {
            return Err(code::ENOMEM);
        }
        let chunk = read_left.min(PAGE_SIZE as usize);
        if chunk > 0 {
            let at = file_page as usize + n * PAGE_SIZE as usize;
            if image.read_at(at, &mut chunk_buf[..chunk]) != chunk {
                return Err(code::ENOEXEC);
            }
            if !vm.write_bytes(upage, &chunk_buf[..chunk]) {
                return Err(code::EFAULT);
            }
            read_left -= chunk;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teal_platform::{FileSystem, SimFileSystem, SimVmSpace};

    const ENTRY: u64 = 0x40_0000;

    struct SegSpec {
        ptype: u32,
        flags: u32,
        offset: u64,
        vaddr: u64,
        filesz: u64,
        memsz: u64,
        data: Vec<u8>,
    }

    fn code_seg(data: &[u8]) -> SegSpec {
        SegSpec {
            ptype: PT_LOAD,
            flags: 5,
            offset: 0x1000,
            vaddr: ENTRY,
            filesz: data.len() as u64,
            memsz: data.len() as u64,
            data: data.to_vec(),
        }
    }

    fn image_bytes(entry: u64, segs: &[SegSpec]) -> Vec<u8> {
        let mut img = vec![0u8; 0x1000];
        img[..4].copy_from_slice(&ELF_MAGIC);
        img[4] = ELFCLASS64;
        img[5] = ELFDATA2LSB;
        img[6] = EV_CURRENT;
        img[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
        img[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
        img[20..24].copy_from_slice(&1u32.to_le_bytes());
        img[24..32].copy_from_slice(&entry.to_le_bytes());
        img[32..40].copy_from_slice(&(EHDR_SIZE as u64).to_le_bytes());
        img[54..56].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        img[56..58].copy_from_slice(&(segs.len() as u16).to_le_bytes());
        for (i, seg) in segs.iter().enumerate() {
            let at = EHDR_SIZE + i * PHDR_SIZE;
            img[at..at + 4].copy_from_slice(&seg.ptype.to_le_bytes());
            img[at + 4..at + 8].copy_from_slice(&seg.flags.to_le_bytes());
            img[at + 8..at + 16].copy_from_slice(&seg.offset.to_le_bytes());
            img[at + 16..at + 24].copy_from_slice(&seg.vaddr.to_le_bytes());
            img[at + 32..at + 40].copy_from_slice(&seg.filesz.to_le_bytes());
            img[at + 40..at + 48].copy_from_slice(&seg.memsz.to_le_bytes());
            let end = seg.offset as usize + seg.data.len();
            if img.len() < end {
                img.resize(end, 0);
            }
            img[seg.offset as usize..end].copy_from_slice(&seg.data);
        }
        img
    }

    fn load_bytes(bytes: &[u8]) -> Result<(u64, Arc<SimVmSpace>), Error> {
        let fs = SimFileSystem::new();
        fs.install("prog", bytes);
        let file = fs.open("prog").unwrap();
        let vm = Arc::new(SimVmSpace::new());
        let entry = load(&file, &(vm.clone() as Arc<dyn VmSpace>))?;
        Ok((entry, vm))
    }

    #[test]
    fn loads_a_minimal_executable() {
        let body = [0x90u8, 0x90, 0xc3];
        let (entry, vm) = load_bytes(&image_bytes(ENTRY, &[code_seg(&body)])).unwrap();
        assert_eq!(entry, ENTRY);
        let mut back = [0u8; 3];
        assert!(vm.read_bytes(ENTRY, &mut back));
        assert_eq!(back, body);
        // Tail of the page is zero-filled.
        let mut tail = [0xffu8; 8];
        assert!(vm.read_bytes(ENTRY + 3, &mut tail));
        assert_eq!(tail, [0u8; 8]);
    }

    #[test]
    fn zero_fills_bss_beyond_file_size() {
        let mut seg = code_seg(&[0xaa, 0xbb]);
        seg.memsz = 64;
        let (_, vm) = load_bytes(&image_bytes(ENTRY, &[seg])).unwrap();
        let mut bss = [0xffu8; 62];
        assert!(vm.read_bytes(ENTRY + 2, &mut bss));
        assert!(bss.iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut img = image_bytes(ENTRY, &[code_seg(&[0xc3])]);
        img[0] = 0x7e;
        assert_eq!(load_bytes(&img).unwrap_err(), code::ENOEXEC);
    }

    #[test]
    fn rejects_wrong_machine() {
        let mut img = image_bytes(ENTRY, &[code_seg(&[0xc3])]);
        img[18..20].copy_from_slice(&0xb7u16.to_le_bytes());
        assert_eq!(load_bytes(&img).unwrap_err(), code::ENOEXEC);
    }

    #[test]
    fn rejects_shared_objects() {
        let mut img = image_bytes(ENTRY, &[code_seg(&[0xc3])]);
        img[16..18].copy_from_slice(&3u16.to_le_bytes());
        assert_eq!(load_bytes(&img).unwrap_err(), code::ENOEXEC);
    }

    #[test]
    fn rejects_dynamic_segments() {
        let mut seg = code_seg(&[0xc3]);
        seg.ptype = PT_DYNAMIC;
        assert_eq!(
            load_bytes(&image_bytes(ENTRY, &[seg])).unwrap_err(),
            code::ENOEXEC
        );
    }

    #[test]
    fn ignores_unknown_segments() {
        let mut note = code_seg(&[]);
        note.ptype = 4;
        note.filesz = 0;
        note.memsz = 0;
        let segs = [code_seg(&[0xc3]), note];
        assert!(load_bytes(&image_bytes(ENTRY, &segs)).is_ok());
    }

    #[test]
    fn rejects_misaligned_segment() {
        let mut seg = code_seg(&[0xc3]);
        seg.offset = 0x1008;
        assert_eq!(
            load_bytes(&image_bytes(ENTRY, &[seg])).unwrap_err(),
            code::ENOEXEC
        );
    }

    #[test]
    fn rejects_memsz_smaller_than_filesz() {
        let mut seg = code_seg(&[0xc3, 0xc3, 0xc3, 0xc3]);
        seg.memsz = 1;
        assert_eq!(
            load_bytes(&image_bytes(ENTRY, &[seg])).unwrap_err(),
            code::ENOEXEC
        );
    }

    #[test]
    fn rejects_first_page_and_kernel_range() {
        let mut low = code_seg(&[0xc3]);
        low.vaddr = 0x800;
        low.offset = 0x1800;
        assert_eq!(
            load_bytes(&image_bytes(ENTRY, &[low])).unwrap_err(),
            code::ENOEXEC
        );

        let mut high = code_seg(&[0xc3]);
        high.vaddr = KERN_BASE - 1;
        high.offset = 0x1000 + ((KERN_BASE - 1) & PAGE_MASK);
        high.memsz = 2;
        high.filesz = 0;
        high.data = vec![0];
        assert_eq!(
            load_bytes(&image_bytes(ENTRY, &[high])).unwrap_err(),
            code::ENOEXEC
        );
    }

    #[test]
    fn rejects_truncated_header() {
        assert_eq!(load_bytes(&[0x7f, b'E']).unwrap_err(), code::ENOEXEC);
    }

    #[test]
    fn rejects_entry_outside_user_range() {
        let img = image_bytes(KERN_BASE + 0x1000, &[code_seg(&[0xc3])]);
        assert_eq!(load_bytes(&img).unwrap_err(), code::ENOEXEC);
    }
}
